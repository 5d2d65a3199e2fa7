//! LDAP-backed directory queries on top of the synchronous `ldap3` client.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, info, warn};

use super::DirectoryQuery;
use crate::config::LdapConfig;
use crate::errors::DirectoryError;
use crate::models::RawEntry;

/// Directory client for a single LDAP server.
///
/// The connection is opened and bound lazily on the first search. A failed
/// search drops the connection so the next call starts from a fresh bind.
pub struct LdapDirectory {
    url: String,
    bind_dn: Option<String>,
    bind_password: Option<String>,
    timeout: Option<Duration>,
    conn: Mutex<Option<LdapConn>>,
}

impl LdapDirectory {
    /// Create a new LDAP directory client. Does not connect.
    pub fn new(
        url: impl Into<String>,
        bind_dn: Option<String>,
        bind_password: Option<String>,
        timeout: Option<Duration>,
    ) -> Self {
        let directory = Self {
            url: url.into(),
            bind_dn,
            bind_password,
            timeout,
            conn: Mutex::new(None),
        };
        info!(url = %directory.url, "created LdapDirectory");
        directory
    }

    pub fn from_config(config: &LdapConfig) -> Self {
        Self::new(
            config.url.clone(),
            config.bind_dn.clone(),
            config.bind_password.clone(),
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    fn lock(&self) -> MutexGuard<'_, Option<LdapConn>> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("LDAP connection mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn connect(&self) -> Result<LdapConn, DirectoryError> {
        debug!(url = %self.url, "connecting to LDAP server");

        let mut settings = LdapConnSettings::new();
        if let Some(timeout) = self.timeout {
            settings = settings.set_conn_timeout(timeout);
        }
        let mut conn = LdapConn::with_settings(settings, &self.url)
            .map_err(|e| DirectoryError::Connection(e.to_string()))?;

        if let Some(ref bind_dn) = self.bind_dn {
            let password = self.bind_password.as_deref().unwrap_or("");
            conn.simple_bind(bind_dn, password)
                .and_then(|result| result.success())
                .map_err(|e| {
                    DirectoryError::Connection(format!("cannot bind as '{}': {}", bind_dn, e))
                })?;
            debug!(bind_dn = %bind_dn, "bound to LDAP server");
        }

        Ok(conn)
    }

    #[cfg(test)]
    fn is_connected(&self) -> bool {
        self.lock().is_some()
    }
}

impl DirectoryQuery for LdapDirectory {
    fn search(
        &self,
        base_dn: &str,
        filter: &str,
        attrs: &[String],
    ) -> Result<Vec<RawEntry>, DirectoryError> {
        let mut guard = self.lock();
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(DirectoryError::Connection("no LDAP connection".into()));
        };

        if let Some(timeout) = self.timeout {
            conn.with_timeout(timeout);
        }

        let outcome = conn
            .search(base_dn, Scope::Subtree, filter, attrs.to_vec())
            .and_then(|result| result.success());

        match outcome {
            Ok((entries, _)) => {
                debug!(base_dn, filter, count = entries.len(), "LDAP search completed");
                Ok(entries
                    .into_iter()
                    .map(SearchEntry::construct)
                    .map(|entry| RawEntry {
                        dn: entry.dn,
                        attributes: entry.attrs,
                    })
                    .collect())
            }
            Err(e) => {
                warn!(base_dn, filter, error = %e, "LDAP search failed, dropping connection");
                *guard = None;
                Err(e.into())
            }
        }
    }
}
