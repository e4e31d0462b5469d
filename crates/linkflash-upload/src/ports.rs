//! Serial port discovery

use crate::error::{Result, UploadError};
use serialport::{SerialPortInfo, SerialPortType};
use std::io::{BufRead, Write};

/// Finds the serial port a device is attached to
pub trait PortFinder {
    fn find(&self) -> Result<String>;
}

/// Name fragments of ports that can carry a flashing connection
const SERIAL_NAME_HINTS: &[&str] = &["ttyUSB", "ttyACM", "cu.usb", "cu.SLAB", "COM"];

/// Finds ports through the operating system's serial port list
///
/// USB ports are preferred. With several candidates the user is asked to
/// pick one on the terminal.
#[derive(Debug, Clone, Default)]
pub struct SerialPortFinder {
    non_interactive: bool,
}

impl SerialPortFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the first candidate instead of prompting
    pub fn non_interactive(mut self) -> Self {
        self.non_interactive = true;
        self
    }
}

impl PortFinder for SerialPortFinder {
    fn find(&self) -> Result<String> {
        let ports = serialport::available_ports()?;
        let candidates = candidate_ports(&ports);
        log::debug!("Serial port candidates: {:?}", candidates);

        if self.non_interactive {
            return choose_port(&candidates, |_| Ok(0));
        }

        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        choose_port(&candidates, |names| {
            prompt_port(names, &mut stdin.lock(), &mut stdout.lock())
        })
    }
}

/// Names of the ports worth offering, USB ports first
pub fn candidate_ports(ports: &[SerialPortInfo]) -> Vec<String> {
    let usb: Vec<String> = ports
        .iter()
        .filter(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
        .map(|p| p.port_name.clone())
        .collect();
    if !usb.is_empty() {
        return usb;
    }

    ports
        .iter()
        .map(|p| p.port_name.clone())
        .filter(|name| SERIAL_NAME_HINTS.iter().any(|hint| name.contains(hint)))
        .collect()
}

/// Pick one port; `pick` is only consulted when there is a choice to make
pub fn choose_port<F>(candidates: &[String], pick: F) -> Result<String>
where
    F: FnOnce(&[String]) -> Result<usize>,
{
    match candidates {
        [] => Err(UploadError::NoSerialPort),
        [only] => {
            log::info!("Using serial port {}", only);
            Ok(only.clone())
        }
        _ => {
            let idx = pick(candidates)?;
            candidates.get(idx).cloned().ok_or_else(|| {
                UploadError::PortSelection(format!("no port numbered {}", idx + 1))
            })
        }
    }
}

/// Ask the user to pick one of `names`
pub fn prompt_port<R: BufRead, W: Write>(
    names: &[String],
    input: &mut R,
    output: &mut W,
) -> Result<usize> {
    writeln!(output, "Multiple serial ports found:")?;
    for (i, name) in names.iter().enumerate() {
        writeln!(output, "  {}) {}", i + 1, name)?;
    }
    write!(output, "Select port [1-{}]: ", names.len())?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let choice: usize = line
        .trim()
        .parse()
        .map_err(|_| UploadError::PortSelection(format!("invalid choice '{}'", line.trim())))?;
    if choice == 0 || choice > names.len() {
        return Err(UploadError::PortSelection(format!(
            "choice {} out of range",
            choice
        )));
    }
    Ok(choice - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn port(name: &str, usb: bool) -> SerialPortInfo {
        let port_type = if usb {
            SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x10c4,
                pid: 0xea60,
                serial_number: None,
                manufacturer: None,
                product: None,
            })
        } else {
            SerialPortType::Unknown
        };
        SerialPortInfo {
            port_name: name.to_string(),
            port_type,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_usb_ports_preferred() {
        let ports = [
            port("/dev/ttyS0", false),
            port("/dev/ttyUSB0", true),
            port("/dev/ttyACM1", false),
        ];
        assert_eq!(candidate_ports(&ports), names(&["/dev/ttyUSB0"]));
    }

    #[test]
    fn test_name_hints_without_usb() {
        let ports = [port("/dev/ttyS0", false), port("/dev/ttyACM1", false)];
        assert_eq!(candidate_ports(&ports), names(&["/dev/ttyACM1"]));
    }

    #[test]
    fn test_no_candidates() {
        let err = choose_port(&[], |_| Ok(0)).unwrap_err();
        assert!(matches!(err, UploadError::NoSerialPort));
    }

    #[test]
    fn test_single_candidate_skips_prompt() {
        let port = choose_port(&names(&["/dev/ttyUSB0"]), |_| {
            panic!("should not prompt for a single port")
        })
        .unwrap();
        assert_eq!(port, "/dev/ttyUSB0");
    }

    #[test]
    fn test_prompt_selection() {
        let candidates = names(&["/dev/ttyUSB0", "/dev/ttyUSB1"]);
        let mut input = std::io::Cursor::new(b"2\n".to_vec());
        let mut output = Vec::new();
        let port = choose_port(&candidates, |n| prompt_port(n, &mut input, &mut output)).unwrap();
        assert_eq!(port, "/dev/ttyUSB1");

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("1) /dev/ttyUSB0"));
        assert!(shown.contains("Select port [1-2]"));
    }

    #[test]
    fn test_prompt_rejects_bad_input() {
        let candidates = names(&["a", "b"]);
        for bad in ["0\n", "3\n", "x\n"] {
            let mut input = std::io::Cursor::new(bad.as_bytes().to_vec());
            let err = prompt_port(&candidates, &mut input, &mut Vec::new()).unwrap_err();
            assert!(matches!(err, UploadError::PortSelection(_)));
        }
    }
}
