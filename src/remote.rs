//! Symbolization using remote symbol services.
//!
//! A symbol service receives the addresses to symbolize as a `+`
//! separated list of hexadecimal numbers (e.g., `0x1000+0x1010`) and
//! answers with one line per resolved address, of the form
//! `0x<address> <symbol>`.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::str;

use crate::log::debug;
use crate::log::warn;
use crate::profile::FunctionInterner;
use crate::profile::FunctionKey;
use crate::profile::Line;
use crate::Addr;
use crate::Error;
use crate::ErrorExt as _;
use crate::ErrorKind;
use crate::Profile;
use crate::Result;


/// The candidate symbol service URLs for the binaries of a profile.
///
/// Mappings are looked up by build identifier first and by file path
/// second. Candidates are tried in order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MappingSources {
    sources: HashMap<String, Vec<String>>,
}

impl MappingSources {
    /// Create an empty set of mapping sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `url` as a candidate for the binary identified by
    /// `source`, which is either a build identifier or a file path.
    pub fn add<S, U>(&mut self, source: S, url: U)
    where
        S: Into<String>,
        U: Into<String>,
    {
        let () = self
            .sources
            .entry(source.into())
            .or_default()
            .push(url.into());
    }

    /// Check whether no candidates are known at all.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Retrieve the candidate URLs for a binary.
    pub fn candidates(&self, build_id: &str, file: &str) -> &[String] {
        [build_id, file]
            .into_iter()
            .filter(|key| !key.is_empty())
            .find_map(|key| self.sources.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}


/// A transport for symbol service requests.
pub trait Post {
    /// Issue a blocking POST of `body` to `url`, returning the response
    /// body on success.
    ///
    /// Only a successful (200) response counts as success.
    fn post(&self, url: &str, body: &[u8]) -> Result<Vec<u8>>;
}

impl<F> Post for F
where
    F: Fn(&str, &[u8]) -> Result<Vec<u8>>,
{
    fn post(&self, url: &str, body: &[u8]) -> Result<Vec<u8>> {
        self(url, body)
    }
}


#[cfg(feature = "http")]
mod http {
    use std::io::Read as _;
    use std::time::Duration;

    use reqwest::blocking::Client;
    use reqwest::header::CONTENT_TYPE;
    use reqwest::StatusCode;

    use crate::Error;
    use crate::ErrorExt as _;
    use crate::ErrorKind;
    use crate::Result;

    use super::Post;


    fn to_error(err: reqwest::Error) -> Error {
        let kind = if err.is_timeout() {
            ErrorKind::TimedOut
        } else {
            ErrorKind::Other
        };
        Error::from_error(kind, err)
    }


    /// A [`Post`] implementation talking HTTP.
    #[derive(Debug)]
    pub struct HttpTransport {
        client: Client,
    }

    impl HttpTransport {
        /// Create a new transport without a request timeout.
        pub fn new() -> Result<Self> {
            let client = Client::builder().build().map_err(to_error)?;
            Ok(Self { client })
        }

        /// Create a new transport aborting requests that take longer
        /// than `timeout`.
        pub fn with_timeout(timeout: Duration) -> Result<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(to_error)?;
            Ok(Self { client })
        }
    }

    impl Post for HttpTransport {
        fn post(&self, url: &str, body: &[u8]) -> Result<Vec<u8>> {
            let mut response = self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(body.to_vec())
                .send()
                .map_err(to_error)
                .with_context(|| format!("http post {url}"))?;

            let status = response.status();
            if status != StatusCode::OK {
                return Err(Error::with_other(format!("server response: {status}")))
            }

            let mut data = Vec::new();
            let _count = response
                .read_to_end(&mut data)
                .with_context(|| format!("failed to read response from {url}"))?;
            Ok(data)
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpTransport;


/// Encode the addresses to symbolize into a request body.
fn encode_request(addrs: &BTreeSet<Addr>) -> String {
    addrs
        .iter()
        .enumerate()
        .fold(String::new(), |mut body, (i, addr)| {
            if i > 0 {
                body.push('+');
            }
            let _result = write!(body, "{addr:#x}");
            body
        })
}

/// Decode a symbol service response into address/symbol pairs.
fn decode_response(data: &[u8]) -> Result<HashMap<Addr, String>> {
    let text = str::from_utf8(data)
        .map_err(|err| Error::from_error(ErrorKind::InvalidData, err))
        .context("symbol service response is not valid UTF-8")?;

    let mut symbols = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        let (addr, name) = match line.split_once(char::is_whitespace) {
            Some((addr, name)) => (addr, name.trim()),
            None => continue,
        };
        let addr = match addr
            .strip_prefix("0x")
            .and_then(|addr| Addr::from_str_radix(addr, 16).ok())
        {
            Some(addr) => addr,
            None => continue,
        };
        if !name.is_empty() {
            let _prev = symbols.insert(addr, name.to_string());
        }
    }
    Ok(symbols)
}


/// Symbolize the mappings of `profile` using symbol services.
///
/// Candidates are tried per mapping until one succeeds. The operation
/// fails only if there was at least one candidate, but no mapping could
/// be symbolized.
pub(crate) fn symbolize(
    profile: &mut Profile,
    sources: &MappingSources,
    transport: &dyn Post,
    force: bool,
) -> Result<()> {
    let mut addrs = vec![BTreeSet::new(); profile.mappings.len()];
    for location in &profile.locations {
        if let Some(addrs) = location.mapping.and_then(|idx| addrs.get_mut(idx)) {
            let _new = addrs.insert(location.address);
        }
    }

    let mut interner = FunctionInterner::new(profile);
    let mut attempted = false;
    let mut succeeded = false;
    let mut last_err = None;

    for (map_idx, addrs) in addrs.iter().enumerate() {
        let mapping = &profile.mappings[map_idx];
        if addrs.is_empty() || (!force && mapping.has_functions) {
            continue
        }

        let candidates = sources.candidates(&mapping.build_id, &mapping.file);
        if candidates.is_empty() {
            continue
        }
        attempted = true;

        let body = encode_request(addrs);
        let mut symbols = None;
        for url in candidates {
            debug!("requesting {} symbols from {url}", addrs.len());
            match transport
                .post(url, body.as_bytes())
                .and_then(|data| decode_response(&data))
            {
                Ok(response) => {
                    symbols = Some(response);
                    break
                }
                Err(err) => {
                    warn!("symbol service {url} failed: {err:#}");
                    last_err =
                        Some(err.with_context(|| format!("failed to symbolize using {url}")));
                }
            }
        }

        let symbols = match symbols {
            Some(symbols) => symbols,
            None => continue,
        };
        succeeded = true;

        let mut resolved = false;
        for location in profile
            .locations
            .iter_mut()
            .filter(|location| location.mapping == Some(map_idx))
        {
            if let Some(name) = symbols.get(&location.address) {
                let key = FunctionKey {
                    name: name.clone(),
                    system_name: name.clone(),
                    filename: String::new(),
                };
                let function_id = interner.intern(&mut profile.functions, key);
                location.lines = vec![Line {
                    function_id,
                    line: 0,
                }];
                resolved = true;
            }
        }

        if resolved {
            profile.mappings[map_idx].has_functions = true;
        }
    }

    match last_err {
        Some(err) if attempted && !succeeded => Err(err),
        _ => Ok(()),
    }
}
