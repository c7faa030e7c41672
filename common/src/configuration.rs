use crate::params::ChainParams;
use config::Config;
use serde::Deserialize;
use std::fmt::{Display, Formatter, Result};

pub const CONFIG_KEY_NETWORK: &str = "network";
pub const CONFIG_KEY_NO_POW_CHECK: &str = "no-pow-check";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Simnet,
    Regnet,
}

impl Network {
    pub fn from_config(config: &Config) -> Self {
        config.get::<Network>(CONFIG_KEY_NETWORK).unwrap_or(Network::Simnet)
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Simnet => write!(f, "simnet"),
            Network::Regnet => write!(f, "regnet"),
        }
    }
}

impl ChainParams {
    pub fn from_config(config: &Config) -> Self {
        Self::for_network(Network::from_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_defaults_to_simnet() {
        let config = Config::builder().build().unwrap();
        assert_eq!(Network::from_config(&config), Network::Simnet);
    }

    #[test]
    fn network_is_read_from_config() {
        let config = Config::builder().set_override(CONFIG_KEY_NETWORK, "regnet").unwrap().build().unwrap();
        assert_eq!(Network::from_config(&config), Network::Regnet);
        assert_eq!(ChainParams::from_config(&config).network, Network::Regnet);
    }
}
