//! SCPI strings sent to the meter and the source, and parsing of meter replies.
use crate::config::{MeterOptions, OutputSetting, ZeroMode};
use crate::drivers::InstrumentError;
pub const RESET: &str = "*RST";
pub const IDENTIFY: &str = "*IDN?";
pub const READ: &str = "READ?";
fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}
/// Commands that put the meter in current mode with the requested conditioning.
/// Sent after `*RST`.
pub fn meter_setup_commands(options: &MeterOptions) -> Vec<String> {
    let mut commands = vec![
        "CONF:CURR".to_string(),
        format!("SENS:CURR:RANG:AUTO {}", on_off(options.autorange)),
        format!("SENS:CURR:NPLC {}", options.nplc),
    ];
    match options.median_rank {
        Some(rank) => {
            commands.push("SENS:MED ON".into());
            commands.push(format!("SENS:MED:RANK {rank}"));
        }
        None => commands.push("SENS:MED OFF".into()),
    }
    commands.push(format!("AVER {}", on_off(options.averaging)));
    let zero = match options.zero_mode {
        ZeroMode::AutoZero => "SYST:AZER",
        ZeroMode::ZeroCorrect => "SYST:ZCOR",
    };
    commands.push(format!("{zero} {}", on_off(options.zero_enabled)));
    commands.push(format!("FORM:ELEM {}", options.elements));
    commands
}
pub fn output_command(on: bool) -> String {
    format!("OUTP {}", on_off(on))
}
pub fn apply_command(output: &OutputSetting) -> String {
    format!(
        "APPL {}, {}, {}",
        output.rail, output.voltage, output.current_limit
    )
}
/// Extracts the current from a reading such as `-1.234E-12A,+1.0E+02,+0.0E+00`.
///
/// `field` selects the comma-separated element; a trailing unit suffix is ignored.
pub fn parse_reading(reply: &str, field: usize) -> Result<f64, InstrumentError> {
    let malformed = || InstrumentError::Malformed {
        reply: reply.to_string(),
    };
    let raw = reply.trim().split(',').nth(field).ok_or_else(malformed)?;
    raw.trim()
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .parse::<f64>()
        .map_err(|_| malformed())
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn default_meter_setup_matches_bench_script() {
        let commands = meter_setup_commands(&MeterOptions::default());
        assert_eq!(
            commands,
            vec![
                "CONF:CURR",
                "SENS:CURR:RANG:AUTO ON",
                "SENS:CURR:NPLC 1",
                "SENS:MED ON",
                "SENS:MED:RANK 1",
                "AVER OFF",
                "SYST:AZER ON",
                "FORM:ELEM CURR",
            ]
        );
    }
    #[test]
    fn zero_correct_variant_and_median_off() {
        let options = MeterOptions {
            median_rank: None,
            zero_mode: ZeroMode::ZeroCorrect,
            elements: "VOLT,CURR".into(),
            ..MeterOptions::default()
        };
        let commands = meter_setup_commands(&options);
        assert!(commands.contains(&"SENS:MED OFF".to_string()));
        assert!(commands.contains(&"SYST:ZCOR ON".to_string()));
        assert_eq!(commands.last().unwrap(), "FORM:ELEM VOLT,CURR");
    }
    #[test]
    fn source_commands() {
        assert_eq!(
            apply_command(&OutputSetting::new("N25V", -17.0, 1.0)),
            "APPL N25V, -17, 1"
        );
        // Operator values go out unrounded.
        assert_eq!(
            apply_command(&OutputSetting::new("P25V", 25.25, 0.05)),
            "APPL P25V, 25.25, 0.05"
        );
        assert_eq!(output_command(true), "OUTP ON");
        assert_eq!(output_command(false), "OUTP OFF");
    }
    #[test]
    fn parses_plain_and_suffixed_readings() {
        assert_eq!(parse_reading("-1.5E-12\n", 0).unwrap(), -1.5e-12);
        assert_eq!(parse_reading("+2.0E-09A,+1.4E+02,+0.0E+00", 0).unwrap(), 2.0e-9);
        assert_eq!(parse_reading("+4.2E+01,-3.0E-13", 1).unwrap(), -3.0e-13);
    }
    #[test]
    fn rejects_garbage_and_missing_fields() {
        assert!(matches!(
            parse_reading("OVERFLOW", 0),
            Err(InstrumentError::Malformed { .. })
        ));
        assert!(matches!(
            parse_reading("1.0", 2),
            Err(InstrumentError::Malformed { .. })
        ));
    }
}
