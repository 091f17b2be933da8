use std::io::{Read, Write};
use std::time::Duration;

use log::{debug, info};
use serialport::{SerialPort, SerialPortType};

use super::{DeviceError, DeviceLink, DeviceResult};

pub const DEFAULT_BAUD: u32 = 9600;
const READ_TIMEOUT: Duration = Duration::from_millis(500);

impl DeviceLink for Box<dyn SerialPort> {
    fn write_all(&mut self, bytes: &[u8]) -> DeviceResult<()> {
        Write::write_all(self, bytes)?;
        self.flush()?;
        Ok(())
    }

    fn bytes_waiting(&mut self) -> DeviceResult<u32> {
        Ok(self.bytes_to_read()?)
    }

    fn read_waiting(&mut self) -> DeviceResult<Vec<u8>> {
        let waiting = self.bytes_to_read()? as usize;
        let mut buf = vec![0u8; waiting];
        if waiting > 0 {
            self.read_exact(&mut buf)?;
        }
        Ok(buf)
    }
}

/// Name of the first USB serial port that identifies as an Arduino.
pub fn find_arduino_port() -> DeviceResult<String> {
    let ports = serialport::available_ports()?;
    debug!("{} serial port(s) available", ports.len());
    ports
        .into_iter()
        .find(|p| match &p.port_type {
            SerialPortType::UsbPort(usb) => [&usb.product, &usb.manufacturer]
                .iter()
                .any(|field| field.as_deref().is_some_and(|s| s.contains("Arduino"))),
            _ => false,
        })
        .map(|p| p.port_name)
        .ok_or(DeviceError::PortNotFound)
}

pub fn open(port: &str, baud: u32) -> DeviceResult<Box<dyn SerialPort>> {
    let handle = serialport::new(port, baud).timeout(READ_TIMEOUT).open()?;
    info!("Opened {port} at {baud} baud");
    Ok(handle)
}
