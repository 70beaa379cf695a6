use std::time::Duration;

use ragol_pkt::Version;
use serde::Deserialize;

/// Which role a listen port plays; the behavior chosen for a connection
/// follows from the port it arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerBehavior {
    /// Sends the pc/console split reconnect and nothing else.
    SplitReconnect,
    Login,
    Lobby,
    DataBb,
    Patch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server_name: String,
    /// Address clients can reach this process on, used in reconnect frames.
    pub local_address: [u8; 4],
    pub console_login_port: u16,
    pub pc_login_port: u16,
    pub lobby_port: u16,
    pub bb_login_port: u16,
    pub bb_patch_port: u16,
    #[serde(default = "default_idle_timeout", with = "secs")]
    pub idle_timeout: Duration,
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(60)
}

mod secs {
    use super::*;
    use serde::Deserializer;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

impl Config {
    /// The login-role port a returning client of this variant should be
    /// redirected to.
    pub fn login_port(&self, version: Version) -> u16 {
        match version {
            Version::Dc | Version::Gc | Version::Xb => self.console_login_port,
            Version::Pc => self.pc_login_port,
            Version::Patch => self.bb_patch_port,
            Version::Bb => self.bb_login_port,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: "ragol".to_string(),
            local_address: [127, 0, 0, 1],
            console_login_port: 5100,
            pc_login_port: 5101,
            lobby_port: 5102,
            bb_login_port: 5103,
            bb_patch_port: 5104,
            idle_timeout: default_idle_timeout(),
        }
    }
}
