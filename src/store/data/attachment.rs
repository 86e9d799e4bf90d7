use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, DbDocument, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProxyScheme {
    #[default]
    Http,
    Https,
    Socks5,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Proxy {
    pub id: String,
    pub name: String,
    pub scheme: ProxyScheme,
    pub ip: String,
    pub port: u16,
    pub enabled: bool,
    pub create_time: i64,
    pub update_time: i64,
}

impl Proxy {
    /// `scheme://ip:port`, or `None` when the proxy is disabled.
    pub fn url(&self) -> Option<String> {
        self.enabled.then(|| format!("{}://{}:{}", self.scheme.as_ref(), self.ip, self.port))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Cookie {
    pub id: String,
    pub name: String,
    pub cookie_text: String,
    pub proxy_id: Option<String>,
    pub create_time: i64,
    pub update_time: i64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct HeaderGroup {
    pub id: String,
    pub name: String,
    pub headers: BTreeMap<String, String>,
    pub proxy_id: Option<String>,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Proxy {
    fn iden() -> StoreIden {
        StoreIden::Proxies
    }
}

impl DbDocument for Proxy {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DbCollectionIden for Cookie {
    fn iden() -> StoreIden {
        StoreIden::Cookies
    }
}

impl DbDocument for Cookie {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DbCollectionIden for HeaderGroup {
    fn iden() -> StoreIden {
        StoreIden::HeaderGroups
    }
}

impl DbDocument for HeaderGroup {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod test {
    use super::{Proxy, ProxyScheme};

    #[test]
    fn test_proxy_url() {
        let mut proxy = Proxy {
            scheme: ProxyScheme::Socks5,
            ip: "10.0.0.2".to_string(),
            port: 1080,
            enabled: true,
            ..Default::default()
        };
        assert_eq!(proxy.url().as_deref(), Some("socks5://10.0.0.2:1080"));
        proxy.enabled = false;
        assert_eq!(proxy.url(), None);
    }
}
