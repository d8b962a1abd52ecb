// src/drivers/mod.rs
// 声明同级目录下的子模块文件
pub mod buffer;
pub mod error;
#[cfg(test)]
pub mod fakes;
pub mod filter;
pub mod gpib;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod scpi;
pub mod simulated;
pub mod source;
// 公开导出这些模块里的结构体，方便外部调用
pub use buffer::{RawSeries, Sample};
pub use error::{ConfigError, InstrumentError, ProcessingError, SinkError};
pub use gpib::PrologixBus;
pub use pipeline::RunResult;
pub use plot::{render_run_png, PlotStyle};
pub use simulated::{SimulatedBus, SimulatedSample};
pub use source::{Ammeter, BiasSource, ResourceManager};
