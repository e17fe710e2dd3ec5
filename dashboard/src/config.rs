use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "dashboard", about = "Web frontend for the IoT platform")]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long = "listen", env = "HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: String,

    #[arg(
        long,
        env = "DEV_MGMT_URL",
        default_value = "http://localhost:8081/api/v0/devices"
    )]
    pub dev_mgmt_url: String,

    /// Defaults to the device management url with `devices` replaced by `admin`
    #[arg(long, env = "ADMIN_URL")]
    pub admin_url: Option<String>,

    /// Defaults to the device management url with `devices` replaced by `alarms`
    #[arg(long, env = "ALARMS_URL")]
    pub alarms_url: Option<String>,

    #[arg(
        long,
        env = "THINGS_URL",
        default_value = "http://localhost:8081/api/v0/things"
    )]
    pub things_url: String,

    #[arg(
        long,
        env = "MEASUREMENTS_URL",
        default_value = "http://localhost:8081/api/v0/measurements"
    )]
    pub measurements_url: String,

    /// Timeout applied to every upstream request
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    #[arg(long, env = "WEB_ASSET_PATH", default_value = "./assets")]
    pub asset_path: PathBuf,

    /// Skip login and send `Bearer devmode` upstream
    #[arg(long, env = "DEVMODE", default_value_t = false)]
    pub devmode: bool,
}

/// Base urls of the upstream services.
#[derive(Debug, Clone)]
pub struct Upstreams {
    pub devices: String,
    pub admin: String,
    pub alarms: String,
    pub things: String,
    pub measurements: String,
}

impl Config {
    pub fn upstreams(&self) -> Upstreams {
        Upstreams {
            devices: self.dev_mgmt_url.clone(),
            admin: self
                .admin_url
                .clone()
                .unwrap_or_else(|| self.dev_mgmt_url.replacen("devices", "admin", 1)),
            alarms: self
                .alarms_url
                .clone()
                .unwrap_or_else(|| self.dev_mgmt_url.replacen("devices", "alarms", 1)),
            things: self.things_url.clone(),
            measurements: self.measurements_url.clone(),
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

impl Upstreams {
    /// All services on one host, laid out the way the simulator serves them.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Upstreams {
            devices: format!("{base}/api/v0/devices"),
            admin: format!("{base}/api/v0/admin"),
            alarms: format!("{base}/api/v0/alarms"),
            things: format!("{base}/api/v0/things"),
            measurements: format!("{base}/api/v0/measurements"),
        }
    }
}
