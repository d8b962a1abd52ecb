// src/types.rs
use std::fmt;

// 偏压源输出状态
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum GeneratorState {
    Disabled,
    Enabled,
}

// 采集循环状态
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum LoopState {
    Idle,
    Sampling,
    Terminated,
}

// 一次测量的结束方式
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum RunOutcome {
    Completed,
    Interrupted,
    Failed,
}

impl RunOutcome {
    pub fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Completed | RunOutcome::Interrupted => 0,
            RunOutcome::Failed => 2,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Interrupted => "interrupted",
            RunOutcome::Failed => "failed",
        };
        f.write_str(label)
    }
}
