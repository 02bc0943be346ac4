//! Sysfs GPIO driver
//!
//! Drives the legacy `/sys/class/gpio` interface:
//! - `export` / `unexport` control files
//! - per-pin `direction`, `active_low`, and `edge` attributes
//! - per-pin `value` file, which signals edges as priority data
//!
//! The root directory is configurable so the driver can run against a
//! fake tree.

use crate::resource::InterruptLine;
use crate::spec::Edge;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Default sysfs GPIO root
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

/// Sysfs GPIO controller
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

impl SysfsGpio {
    /// Create a controller rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the GPIO tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of an exported pin
    pub fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    /// Whether the pin's directory is present
    pub fn is_exported(&self, pin: u32) -> bool {
        self.pin_dir(pin).is_dir()
    }

    /// Export a pin; a pin that is already exported is reused
    ///
    /// Returns `true` when this call did the export, `false` when the pin
    /// was already exported by someone else and must be left exported.
    pub fn export(&self, pin: u32) -> io::Result<bool> {
        if self.is_exported(pin) {
            tracing::debug!("GPIO {} already exported", pin);
            return Ok(false);
        }
        write_control(&self.root.join("export"), pin)?;
        Ok(true)
    }

    /// Unexport a pin
    pub fn unexport(&self, pin: u32) -> io::Result<()> {
        write_control(&self.root.join("unexport"), pin)
    }

    fn write_attr(&self, pin: u32, attr: &str, value: &str) -> io::Result<()> {
        let path = self.pin_dir(pin).join(attr);
        fs::write(&path, value).map_err(|e| {
            io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
        })
    }

    /// Export and configure a pin as an edge-triggered input
    ///
    /// On any failure a pin exported by this call is unexported again
    /// before returning.
    pub fn open_interrupt(&self, pin: u32, edge: Edge, active_low: bool) -> io::Result<InterruptLine> {
        let export = ExportGuard::export(self, pin)?;

        self.write_attr(pin, "direction", "in")?;
        self.write_attr(pin, "active_low", if active_low { "1" } else { "0" })?;
        self.write_attr(pin, "edge", edge.as_sysfs())?;

        let value_path = self.pin_dir(pin).join("value");
        let file = File::open(&value_path).map_err(|e| {
            io::Error::new(e.kind(), format!("{}: {}", value_path.display(), e))
        })?;
        let mut line = if export.exported_here {
            InterruptLine::exported(pin, file)
        } else {
            InterruptLine::new(pin, file)
        };

        // Clear the level pending since export so the first wakeup is a real edge
        let level = line.read_level()?;
        tracing::debug!("GPIO {} armed on {} edge, level {}", pin, edge, level);

        export.commit();
        Ok(line)
    }
}

fn write_control(path: &Path, pin: u32) -> io::Result<()> {
    fs::write(path, pin.to_string())
        .map_err(|e| io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
}

/// Unexports a pin it exported itself on drop, unless committed
struct ExportGuard<'a> {
    gpio: &'a SysfsGpio,
    pin: u32,
    exported_here: bool,
    committed: bool,
}

impl<'a> ExportGuard<'a> {
    fn export(gpio: &'a SysfsGpio, pin: u32) -> io::Result<Self> {
        let exported_here = gpio.export(pin)?;
        Ok(Self {
            gpio,
            pin,
            exported_here,
            committed: false,
        })
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ExportGuard<'_> {
    fn drop(&mut self) {
        if self.committed || !self.exported_here {
            return;
        }
        tracing::debug!("Rolling back export of GPIO {}", self.pin);
        if let Err(e) = self.gpio.unexport(self.pin) {
            tracing::warn!("Failed to unexport GPIO {}: {}", self.pin, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_tree(pin: u32) -> (TempDir, SysfsGpio) {
        let dir = TempDir::new().unwrap();
        let pin_dir = dir.path().join(format!("gpio{}", pin));
        fs::create_dir(&pin_dir).unwrap();
        fs::write(pin_dir.join("value"), "0\n").unwrap();
        let gpio = SysfsGpio::new(dir.path());
        (dir, gpio)
    }

    #[test]
    fn test_open_interrupt_configures_pin() {
        let (dir, gpio) = fake_tree(47);
        let mut line = gpio.open_interrupt(47, Edge::Both, true).unwrap();

        let pin_dir = dir.path().join("gpio47");
        assert_eq!(fs::read_to_string(pin_dir.join("direction")).unwrap(), "in");
        assert_eq!(fs::read_to_string(pin_dir.join("active_low")).unwrap(), "1");
        assert_eq!(fs::read_to_string(pin_dir.join("edge")).unwrap(), "both");
        assert_eq!(line.pin(), 47);
        assert!(!line.exported_here());
        assert_eq!(line.read_level().unwrap(), 0);
        // already exported, so nothing was written to export
        assert!(!dir.path().join("export").exists());
        assert!(!dir.path().join("unexport").exists());
    }

    #[test]
    fn test_export_writes_pin_number() {
        let dir = TempDir::new().unwrap();
        let gpio = SysfsGpio::new(dir.path());
        assert!(gpio.export(60).unwrap());
        assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "60");
        gpio.unexport(60).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "60");
    }

    #[test]
    fn test_export_reuses_existing_pin() {
        let (dir, gpio) = fake_tree(61);
        assert!(!gpio.export(61).unwrap());
        assert!(!dir.path().join("export").exists());
    }

    #[test]
    fn test_partial_setup_unexports() {
        let dir = TempDir::new().unwrap();
        let gpio = SysfsGpio::new(dir.path());

        // the pin directory never appears, so configuring it fails after export
        let err = gpio.open_interrupt(30, Edge::Rising, false).unwrap_err();
        assert!(err.to_string().contains("direction"));
        assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "30");
        assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "30");
    }

    #[test]
    fn test_partial_setup_leaves_foreign_export() {
        let (dir, gpio) = fake_tree(30);
        // a directory where the edge attribute should be makes the write fail
        fs::create_dir(dir.path().join("gpio30").join("edge")).unwrap();

        let err = gpio.open_interrupt(30, Edge::Rising, false).unwrap_err();
        assert!(err.to_string().contains("edge"));
        assert!(!dir.path().join("unexport").exists());
        assert!(dir.path().join("gpio30").is_dir());
    }

    #[test]
    fn test_missing_root_fails() {
        let gpio = SysfsGpio::new("/nonexistent/gemkit/gpio");
        assert!(gpio.open_interrupt(5, Edge::Rising, false).is_err());
    }
}
