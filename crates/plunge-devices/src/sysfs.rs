//! Linux sysfs sensor gateway.
//!
//! Temperatures come from DS18B20-style 1-wire probes exposed by the `w1_therm`
//! driver at `<root>/bus/w1/devices/<id>/w1_slave`. The leak input and the
//! pump/ozone relays are GPIO lines already exported under
//! `<root>/class/gpio/gpio<N>/` with their direction configured.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use plunge_core::gateways::SensorGateway;
use plunge_core::models::celsius_to_fahrenheit;
use plunge_core::{PlungeError, Result};
use regex::Regex;

// ── Pins ──────────────────────────────────────────────────────────────────────

/// GPIO line assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysfsPins {
    pub leak: u32,
    pub pump: u32,
    pub ozone: u32,
    /// The leak detector pulls its line low when wet.
    pub leak_active_low: bool,
}

// ── SysfsSensors ──────────────────────────────────────────────────────────────

/// Sensor gateway backed by sysfs device files.
#[derive(Debug, Clone)]
pub struct SysfsSensors {
    root: PathBuf,
    room_probe: String,
    water_probe: String,
    pins: SysfsPins,
}

impl SysfsSensors {
    pub fn new(
        root: impl Into<PathBuf>,
        room_probe: impl Into<String>,
        water_probe: impl Into<String>,
        pins: SysfsPins,
    ) -> Self {
        Self {
            root: root.into(),
            room_probe: room_probe.into(),
            water_probe: water_probe.into(),
            pins,
        }
    }

    fn probe_path(&self, id: &str) -> PathBuf {
        w1_devices_dir(&self.root).join(id).join("w1_slave")
    }

    fn gpio_value_path(&self, pin: u32) -> PathBuf {
        self.root
            .join("class")
            .join("gpio")
            .join(format!("gpio{pin}"))
            .join("value")
    }

    async fn read_probe(&self, sensor: &'static str, id: &str) -> Result<f64> {
        let path = self.probe_path(id);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PlungeError::DeviceFile { path, source })?;
        let celsius = parse_w1_slave(&contents).map_err(|msg| PlungeError::sensor(sensor, msg))?;
        Ok(celsius_to_fahrenheit(celsius))
    }

    async fn read_gpio(&self, pin: u32) -> Result<bool> {
        let path = self.gpio_value_path(pin);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PlungeError::DeviceFile {
                path: path.clone(),
                source,
            })?;
        match contents.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(PlungeError::sensor(
                "gpio",
                format!("unexpected value {other:?} in {}", path.display()),
            )),
        }
    }

    async fn write_gpio(&self, device: &'static str, pin: u32, high: bool) -> Result<()> {
        let path = self.gpio_value_path(pin);
        tokio::fs::write(&path, if high { "1" } else { "0" })
            .await
            .map_err(|e| PlungeError::actuator(device, format!("{}: {e}", path.display())))
    }
}

impl SensorGateway for SysfsSensors {
    async fn read_room_and_water_temperature(&self) -> (Result<f64>, Result<f64>) {
        tokio::join!(
            self.read_probe("room", &self.room_probe),
            self.read_probe("water", &self.water_probe),
        )
    }

    async fn is_leak_present(&self) -> Result<bool> {
        let level = self.read_gpio(self.pins.leak).await?;
        Ok(level != self.pins.leak_active_low)
    }

    async fn turn_pump_on(&self) -> Result<()> {
        self.write_gpio("pump", self.pins.pump, true).await
    }

    async fn turn_pump_off(&self) -> Result<()> {
        self.write_gpio("pump", self.pins.pump, false).await
    }

    async fn is_pump_on(&self) -> Result<bool> {
        self.read_gpio(self.pins.pump).await
    }

    async fn turn_ozone_on(&self) -> Result<()> {
        self.write_gpio("ozone", self.pins.ozone, true).await
    }

    async fn turn_ozone_off(&self) -> Result<()> {
        self.write_gpio("ozone", self.pins.ozone, false).await
    }
}

// ── 1-wire helpers ────────────────────────────────────────────────────────────

fn w1_devices_dir(root: &Path) -> PathBuf {
    root.join("bus").join("w1").join("devices")
}

/// List the ids of DS18B20 probes (family code `28-`) under `root`, sorted.
pub fn discover_w1_sensors(root: &Path) -> Vec<String> {
    let dir = w1_devices_dir(root);
    if !dir.exists() {
        tracing::warn!(path = %dir.display(), "1-wire device directory missing");
        return Vec::new();
    }

    let mut ids: Vec<String> = walkdir::WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| name.starts_with("28-"))
        .collect();

    ids.sort();
    ids
}

/// Parse the two-line `w1_slave` report and return degrees Celsius.
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
fn parse_w1_slave(contents: &str) -> std::result::Result<f64, String> {
    static CRC: OnceLock<Regex> = OnceLock::new();
    static TEMP: OnceLock<Regex> = OnceLock::new();
    let crc = CRC.get_or_init(|| Regex::new(r"crc=[0-9a-fA-F]{2} (YES|NO)").expect("valid regex"));
    let temp = TEMP.get_or_init(|| Regex::new(r"t=(-?\d+)").expect("valid regex"));

    match crc.captures(contents).map(|c| c[1].to_string()) {
        Some(ok) if ok == "YES" => {}
        Some(_) => return Err("crc check failed".to_string()),
        None => return Err("missing crc line".to_string()),
    }

    let millis: i64 = temp
        .captures(contents)
        .ok_or_else(|| "missing t= field".to_string())?[1]
        .parse()
        .map_err(|e| format!("bad t= field: {e}"))?;

    Ok(millis as f64 / 1000.0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GOOD_REPORT: &str = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n\
                               72 01 4b 46 7f ff 0e 10 57 t=23125\n";

    const PINS: SysfsPins = SysfsPins {
        leak: 17,
        pump: 27,
        ozone: 22,
        leak_active_low: false,
    };

    // ── helpers ───────────────────────────────────────────────────────────

    fn write_probe(root: &Path, id: &str, report: &str) {
        let dir = w1_devices_dir(root).join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("w1_slave"), report).unwrap();
    }

    fn write_gpio(root: &Path, pin: u32, value: &str) {
        let dir = root.join("class").join("gpio").join(format!("gpio{pin}"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("value"), value).unwrap();
    }

    fn read_gpio_file(root: &Path, pin: u32) -> String {
        std::fs::read_to_string(
            root.join("class")
                .join("gpio")
                .join(format!("gpio{pin}"))
                .join("value"),
        )
        .unwrap()
    }

    fn fake_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write_probe(tmp.path(), "28-room", GOOD_REPORT);
        write_probe(
            tmp.path(),
            "28-water",
            "aa : crc=aa YES\naa t=10000\n",
        );
        write_gpio(tmp.path(), PINS.leak, "0\n");
        write_gpio(tmp.path(), PINS.pump, "0\n");
        write_gpio(tmp.path(), PINS.ozone, "0\n");
        tmp
    }

    // ── parse_w1_slave ────────────────────────────────────────────────────

    #[test]
    fn test_parse_w1_slave_good() {
        let celsius = parse_w1_slave(GOOD_REPORT).unwrap();
        assert!((celsius - 23.125).abs() < 1e-9);
    }

    #[test]
    fn test_parse_w1_slave_negative() {
        let celsius = parse_w1_slave("x : crc=01 YES\nx t=-1250\n").unwrap();
        assert!((celsius + 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_parse_w1_slave_crc_failure() {
        let err = parse_w1_slave("x : crc=01 NO\nx t=1000\n").unwrap_err();
        assert!(err.contains("crc"));
    }

    #[test]
    fn test_parse_w1_slave_missing_temperature() {
        assert!(parse_w1_slave("x : crc=01 YES\n").is_err());
        assert!(parse_w1_slave("").is_err());
    }

    // ── discovery ─────────────────────────────────────────────────────────

    #[test]
    fn test_discover_w1_sensors_filters_family() {
        let tmp = fake_tree();
        std::fs::create_dir_all(w1_devices_dir(tmp.path()).join("w1_bus_master1")).unwrap();
        assert_eq!(
            discover_w1_sensors(tmp.path()),
            vec!["28-room".to_string(), "28-water".to_string()]
        );
    }

    #[test]
    fn test_discover_w1_sensors_missing_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(discover_w1_sensors(tmp.path()).is_empty());
    }

    // ── gateway ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_reads_temperatures_in_fahrenheit() {
        let tmp = fake_tree();
        let sensors = SysfsSensors::new(tmp.path(), "28-room", "28-water", PINS);
        let (room, water) = sensors.read_room_and_water_temperature().await;
        assert!((room.unwrap() - 73.625).abs() < 1e-9);
        assert!((water.unwrap() - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_one_probe_failing_does_not_block_other() {
        let tmp = fake_tree();
        let sensors = SysfsSensors::new(tmp.path(), "28-missing", "28-water", PINS);
        let (room, water) = sensors.read_room_and_water_temperature().await;
        assert!(matches!(room, Err(PlungeError::DeviceFile { .. })));
        assert!(water.is_ok());
    }

    #[tokio::test]
    async fn test_leak_polarity() {
        let tmp = fake_tree();
        let sensors = SysfsSensors::new(tmp.path(), "28-room", "28-water", PINS);
        assert!(!sensors.is_leak_present().await.unwrap());
        write_gpio(tmp.path(), PINS.leak, "1\n");
        assert!(sensors.is_leak_present().await.unwrap());

        let active_low = SysfsPins {
            leak_active_low: true,
            ..PINS
        };
        let sensors = SysfsSensors::new(tmp.path(), "28-room", "28-water", active_low);
        assert!(!sensors.is_leak_present().await.unwrap());
    }

    #[tokio::test]
    async fn test_relays_write_value_files() {
        let tmp = fake_tree();
        let sensors = SysfsSensors::new(tmp.path(), "28-room", "28-water", PINS);

        sensors.turn_pump_on().await.unwrap();
        assert_eq!(read_gpio_file(tmp.path(), PINS.pump), "1");
        assert!(sensors.is_pump_on().await.unwrap());

        sensors.turn_ozone_on().await.unwrap();
        assert_eq!(read_gpio_file(tmp.path(), PINS.ozone), "1");
        sensors.turn_ozone_off().await.unwrap();
        assert_eq!(read_gpio_file(tmp.path(), PINS.ozone), "0");
    }

    #[tokio::test]
    async fn test_relay_write_failure_is_actuator_error() {
        let tmp = TempDir::new().unwrap();
        let sensors = SysfsSensors::new(tmp.path(), "28-room", "28-water", PINS);
        let err = sensors.turn_ozone_off().await.unwrap_err();
        assert!(matches!(err, PlungeError::Actuator { device: "ozone", .. }));
    }

    #[tokio::test]
    async fn test_garbage_gpio_value() {
        let tmp = fake_tree();
        write_gpio(tmp.path(), PINS.leak, "x\n");
        let sensors = SysfsSensors::new(tmp.path(), "28-room", "28-water", PINS);
        assert!(matches!(
            sensors.is_leak_present().await,
            Err(PlungeError::Sensor { sensor: "gpio", .. })
        ));
    }
}
