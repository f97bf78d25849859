//! `Alt-Svc` header parsing and formatting (RFC 7838)
//!
//! ```text
//! Alt-Svc       = clear / 1#alt-value
//! alt-value     = protocol-id "=" alt-authority *( OWS ";" OWS parameter )
//! alt-authority = quoted-string   ; "[host]:port"
//! parameter     = token "=" ( token / quoted-string )
//! ```
//!
//! The server formats its own advertisement with [`AltService`]'s `Display`;
//! the client parses the handshake response with [`parse`].

use std::fmt;

/// Max-age assumed when an entry carries no `ma` parameter
pub const DEFAULT_MAX_AGE: u64 = 86_400;

/// Error type for `Alt-Svc` parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AltSvcError {
    /// Header value is empty or only whitespace/commas
    #[error("empty Alt-Svc header")]
    Empty,
    /// A token was expected at the given byte offset
    #[error("expected token at offset {0}")]
    ExpectedToken(usize),
    /// A specific character was expected at the given byte offset
    #[error("expected '{expected}' at offset {offset}")]
    ExpectedChar {
        /// Character that was expected
        expected: char,
        /// Byte offset into the header value
        offset: usize,
    },
    /// A quoted string was not terminated
    #[error("unterminated quoted string at offset {0}")]
    UnterminatedQuote(usize),
    /// Alternative authority is not `host:port`
    #[error("invalid alternative authority: {0:?}")]
    InvalidAuthority(String),
    /// Port is not a valid u16
    #[error("invalid port in alternative authority: {0:?}")]
    InvalidPort(String),
    /// Protocol id contains a malformed percent-encoding
    #[error("invalid percent-encoding in protocol id: {0:?}")]
    InvalidProtocolId(String),
    /// A known parameter has an unusable value
    #[error("invalid value {value:?} for parameter {name}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Raw parameter value
        value: String,
    },
}

/// Parsed header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltSvc {
    /// `clear`: all previously advertised alternatives are invalidated
    Clear,
    /// Alternatives in declaration order
    Services(Vec<AltService>),
}

impl AltSvc {
    /// Advertised alternatives (empty for `clear`)
    pub fn services(&self) -> &[AltService] {
        match self {
            AltSvc::Clear => &[],
            AltSvc::Services(services) => services,
        }
    }

    /// Alternatives with the given protocol id, in declaration order
    pub fn matching<'a>(
        &'a self,
        protocol_id: &'a str,
    ) -> impl Iterator<Item = &'a AltService> + 'a {
        self.services()
            .iter()
            .filter(move |service| service.protocol_id == protocol_id)
    }
}

/// One advertised alternative service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltService {
    /// ALPN protocol id, percent-decoded (e.g. `h3`)
    pub protocol_id: String,
    /// Alternative host; empty means the origin's host
    pub host: String,
    /// Alternative port
    pub port: u16,
    /// Freshness lifetime in seconds (`ma`), if given
    pub max_age: Option<u64>,
    /// `persist=1`
    pub persist: bool,
    /// Any other parameters, lowercased names, in order
    pub params: Vec<(String, String)>,
}

impl AltService {
    /// Create an alternative with no parameters
    pub fn new(protocol_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol_id: protocol_id.into(),
            host: host.into(),
            port,
            max_age: None,
            persist: false,
            params: Vec::new(),
        }
    }

    /// Set the `ma` parameter
    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Effective freshness lifetime in seconds
    pub fn max_age(&self) -> u64 {
        self.max_age.unwrap_or(DEFAULT_MAX_AGE)
    }

    /// Check whether the alternative is on the origin's host
    pub fn is_same_host(&self) -> bool {
        self.host.is_empty()
    }

    /// `host:port` to connect to, resolving an empty host to `origin_host`
    pub fn authority(&self, origin_host: &str) -> String {
        let host = if self.host.is_empty() {
            origin_host
        } else {
            &self.host
        };

        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl fmt::Display for AltService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.protocol_id.bytes() {
            if is_tchar(byte) && byte != b'%' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "%{:02X}", byte)?;
            }
        }

        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        write!(f, "=\"{}:{}\"", host, self.port)?;

        if let Some(max_age) = self.max_age {
            write!(f, "; ma={}", max_age)?;
        }
        if self.persist {
            f.write_str("; persist=1")?;
        }
        for (name, value) in &self.params {
            if !value.is_empty() && value.bytes().all(is_tchar) {
                write!(f, "; {}={}", name, value)?;
            } else {
                write!(f, "; {}=\"{}\"", name, value.replace('\\', "\\\\").replace('"', "\\\""))?;
            }
        }

        Ok(())
    }
}

/// Parse an `Alt-Svc` header value
pub fn parse(header: &str) -> Result<AltSvc, AltSvcError> {
    if header.trim().eq_ignore_ascii_case("clear") {
        return Ok(AltSvc::Clear);
    }

    let mut scanner = Scanner::new(header);
    let mut services = Vec::new();

    loop {
        scanner.skip_ws();
        // Empty list elements are allowed by the #rule
        if scanner.eat(b',') {
            continue;
        }
        if scanner.at_end() {
            break;
        }

        services.push(parse_alternative(&mut scanner)?);

        scanner.skip_ws();
        if scanner.at_end() {
            break;
        }
        scanner.expect(b',')?;
    }

    if services.is_empty() {
        return Err(AltSvcError::Empty);
    }

    Ok(AltSvc::Services(services))
}

fn parse_alternative(scanner: &mut Scanner<'_>) -> Result<AltService, AltSvcError> {
    let protocol_id = percent_decode(scanner.token()?)?;
    scanner.expect(b'=')?;
    let authority = scanner.quoted()?;
    let (host, port) = split_authority(&authority)?;

    let mut service = AltService::new(protocol_id, host, port);

    loop {
        scanner.skip_ws();
        if !scanner.eat(b';') {
            break;
        }
        scanner.skip_ws();

        let name = scanner.token()?.to_ascii_lowercase();
        scanner.expect(b'=')?;
        let value = scanner.token_or_quoted()?;

        match name.as_str() {
            "ma" => {
                service.max_age = Some(
                    value
                        .parse()
                        .map_err(|_| AltSvcError::InvalidParameter { name, value })?,
                );
            }
            "persist" => service.persist = value == "1",
            _ => service.params.push((name, value)),
        }
    }

    Ok(service)
}

fn split_authority(authority: &str) -> Result<(String, u16), AltSvcError> {
    let invalid = || AltSvcError::InvalidAuthority(authority.to_string());

    let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
        let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
        let port = rest.strip_prefix(':').ok_or_else(invalid)?;
        (host, port)
    } else {
        authority.rsplit_once(':').ok_or_else(invalid)?
    };

    if host.contains(':') && !authority.starts_with('[') {
        return Err(invalid());
    }

    let port = port
        .parse::<u16>()
        .map_err(|_| AltSvcError::InvalidPort(port.to_string()))?;

    Ok((host.to_string(), port))
}

fn percent_decode(raw: &str) -> Result<String, AltSvcError> {
    let invalid = || AltSvcError::InvalidProtocolId(raw.to_string());
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = raw.get(i + 1..i + 3).ok_or_else(invalid)?;
            out.push(u8::from_str_radix(hex, 16).map_err(|_| invalid())?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out).map_err(|_| invalid())
}

fn is_tchar(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), AltSvcError> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(AltSvcError::ExpectedChar {
                expected: byte as char,
                offset: self.pos,
            })
        }
    }

    fn token(&mut self) -> Result<&'a str, AltSvcError> {
        let start = self.pos;
        while self.peek().is_some_and(is_tchar) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(AltSvcError::ExpectedToken(start));
        }
        Ok(&self.input[start..self.pos])
    }

    fn quoted(&mut self) -> Result<String, AltSvcError> {
        let start = self.pos;
        self.expect(b'"')?;

        let mut out = String::new();
        let mut chars = self.input[self.pos..].char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += offset + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                _ => out.push(c),
            }
        }

        Err(AltSvcError::UnterminatedQuote(start))
    }

    fn token_or_quoted(&mut self) -> Result<String, AltSvcError> {
        if self.peek() == Some(b'"') {
            self.quoted()
        } else {
            self.token().map(str::to_string)
        }
    }
}
