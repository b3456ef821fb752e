use crate::MSeedError;
use std::fmt;

pub const PREFIX: &str = "FDSN:";
const SEP: char = '_';

/// An FDSN Source Identifier string parsed into its component parts. Also
/// accepts the abbreviated network/station/location forms described in the
/// spec, which this crate represents as an `FdsnSourceIdentifier` with the
/// trailing segments left empty.
/// See the specification at <http://docs.fdsn.org/projects/source-identifiers/en/v1.0/index.html>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdsnSourceIdentifier {
    pub network: String,
    pub station: String,
    pub location: String,
    pub band: String,
    pub source: String,
    pub subsource: String,
}

impl FdsnSourceIdentifier {
    /// Calculates the length when turned back into a string. This includes
    /// 5 bytes for the FDSN: prefix and one underscore separator per segment
    /// actually present.
    pub fn calc_len(&self) -> u8 {
        self.to_string().len() as u8
    }
    /// Returns a byte slice of this identifier.
    pub fn as_bytes(&self) -> Vec<u8> {
        Vec::from(self.to_string().as_bytes())
    }

    /// Parses identifier from Vec of bytes
    pub fn from_utf8(vec: Vec<u8>) -> Result<FdsnSourceIdentifier, MSeedError> {
        let text = String::from_utf8(vec)?;
        FdsnSourceIdentifier::parse(&text)
    }

    /// Parses a full channel identifier like `FDSN:CO_BIRD_00_H_H_Z`, as
    /// well as the abbreviated network (`FDSN:CO`), station
    /// (`FDSN:CO_BIRD`) and location (`FDSN:CO_BIRD_00`) forms. Missing
    /// trailing segments are left as empty strings.
    pub fn parse(id: &str) -> Result<FdsnSourceIdentifier, MSeedError> {
        let rest = id.strip_prefix(PREFIX).ok_or_else(|| {
            MSeedError::IdentifierParse(id.to_string(), String::from("missing FDSN: prefix"))
        })?;
        let items: Vec<&str> = rest.split(SEP).collect();
        let sid = match items.len() {
            1 => FdsnSourceIdentifier {
                network: items[0].to_string(),
                station: String::new(),
                location: String::new(),
                band: String::new(),
                source: String::new(),
                subsource: String::new(),
            },
            2 => FdsnSourceIdentifier {
                network: items[0].to_string(),
                station: items[1].to_string(),
                location: String::new(),
                band: String::new(),
                source: String::new(),
                subsource: String::new(),
            },
            3 => FdsnSourceIdentifier {
                network: items[0].to_string(),
                station: items[1].to_string(),
                location: items[2].to_string(),
                band: String::new(),
                source: String::new(),
                subsource: String::new(),
            },
            6 => FdsnSourceIdentifier {
                network: items[0].to_string(),
                station: items[1].to_string(),
                location: items[2].to_string(),
                band: items[3].to_string(),
                source: items[4].to_string(),
                subsource: items[5].to_string(),
            },
            _ => {
                return Err(MSeedError::IdentifierParse(
                    id.to_string(),
                    String::from(
                        "must have 6 items for channel, 3 for location, 2 for station or 1 for network",
                    ),
                ))
            }
        };
        Ok(sid)
    }

    /// Builds a source id from the older SEED-style network/station/location
    /// plus a 3-character channel code, or a longer underscore-separated
    /// band_source_subsource channel code.
    pub fn from_nslc(
        net: &str,
        sta: &str,
        loc: &str,
        channel_code: &str,
    ) -> Result<FdsnSourceIdentifier, MSeedError> {
        let (band, source, subsource) = if channel_code.chars().count() == 3 {
            let mut chars = channel_code.chars();
            (
                chars.next().unwrap().to_string(),
                chars.next().unwrap().to_string(),
                chars.next().unwrap().to_string(),
            )
        } else {
            let parts: Vec<&str> = channel_code.split(SEP).collect();
            if parts.len() == 3 {
                (
                    parts[0].to_string(),
                    parts[1].to_string(),
                    parts[2].to_string(),
                )
            } else {
                return Err(MSeedError::IdentifierParse(
                    channel_code.to_string(),
                    String::from("channel code must be length 3 or 3 items separated by '_'"),
                ));
            }
        };
        Ok(FdsnSourceIdentifier {
            network: net.to_string(),
            station: sta.to_string(),
            location: loc.to_string(),
            band,
            source,
            subsource,
        })
    }

    /// Parses an older SEED-style dot-separated nslc string, e.g.
    /// `CO.BIRD.00.HHZ`.
    pub fn parse_nslc(nslc: &str, sep: char) -> Result<FdsnSourceIdentifier, MSeedError> {
        let items: Vec<&str> = nslc.split(sep).collect();
        if items.len() < 4 {
            return Err(MSeedError::IdentifierParse(
                nslc.to_string(),
                format!("nslc must have 4 items separated by '{}'", sep),
            ));
        }
        FdsnSourceIdentifier::from_nslc(items[0], items[1], items[2], items[3])
    }

    /// Converts the channel segments back into an older SEED-style channel
    /// code: 3 characters if band/source/subsource are each single
    /// characters, else an underscore-joined longer form.
    pub fn short_channel_code(&self) -> String {
        if self.band.chars().count() == 1
            && self.source.chars().count() == 1
            && self.subsource.chars().count() == 1
        {
            format!("{}{}{}", self.band, self.source, self.subsource)
        } else {
            format!("{}_{}_{}", self.band, self.source, self.subsource)
        }
    }

    /// Validates length limits on each segment. Band and subsource may be
    /// empty; network, station and source may not.
    pub fn validate(&self) -> Result<(), MSeedError> {
        if self.network.is_empty() {
            return Err(MSeedError::ValidationError(String::from("network code empty")));
        }
        if self.network.len() > 8 {
            return Err(MSeedError::ValidationError(format!(
                "network code > 8 chars: {}",
                self.network
            )));
        }
        if self.station.is_empty() {
            return Err(MSeedError::ValidationError(String::from("station code empty")));
        }
        if self.station.len() > 8 {
            return Err(MSeedError::ValidationError(format!(
                "station code > 8 chars: {}",
                self.station
            )));
        }
        if self.location == "--" {
            return Err(MSeedError::ValidationError(String::from(
                "location code cannot be '--'",
            )));
        }
        if self.location.len() > 8 {
            return Err(MSeedError::ValidationError(format!(
                "location code > 8 chars: {}",
                self.location
            )));
        }
        if self.source.is_empty() {
            return Err(MSeedError::ValidationError(String::from("source code empty")));
        }
        Ok(())
    }

    /// Creates a source id for non-real or synthetic data. Network defaults
    /// to `XX`, the "do not use" network. The band code is derived from the
    /// optional sample rate (or period, if negative) and response lower
    /// corner via [`band_code_for_rate`].
    pub fn create_unknown(
        sample_rate: Option<f64>,
        source: &str,
        response_lb: Option<f64>,
        network: &str,
        station: &str,
        location: &str,
        subsource: &str,
    ) -> FdsnSourceIdentifier {
        let network = if network.is_empty() { "XX" } else { network };
        let station = if station.is_empty() { "ABC" } else { station };
        FdsnSourceIdentifier {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            band: band_code_for_rate(sample_rate, response_lb),
            source: source.to_string(),
            subsource: subsource.to_string(),
        }
    }

    pub fn create_fake_channel() -> FdsnSourceIdentifier {
        FdsnSourceIdentifier {
            network: String::from("XX"),
            station: String::from("STA"),
            location: String::from("00"),
            band: String::from("B"),
            source: String::from("H"),
            subsource: String::from("Z"),
        }
    }
}

impl fmt::Display for FdsnSourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", PREFIX, self.network)?;
        if !self.station.is_empty() || !self.location.is_empty() || !self.band.is_empty() {
            write!(f, "_{}", self.station)?;
        }
        if !self.location.is_empty() || !self.band.is_empty() {
            write!(f, "_{}", self.location)?;
        }
        if !self.band.is_empty() || !self.source.is_empty() || !self.subsource.is_empty() {
            write!(
                f,
                "_{}_{}_{}",
                self.band, self.source, self.subsource
            )?;
        }
        Ok(())
    }
}

/// Calculates the FDSN band code for the given sample rate (or period, if
/// negative) in Hertz, optionally using the response lower corner
/// (or period, if negative) to disambiguate broadband from short period
/// above 0.1 Hz. Returns `"I"` (irregular) when no rate is given.
pub fn band_code_for_rate(sample_rate_period: Option<f64>, response_lb: Option<f64>) -> String {
    let rate = match sample_rate_period {
        None => return String::from("I"),
        Some(r) if r == 0.0 => return String::from("I"),
        Some(r) if r > 0.0 => r,
        Some(r) => -1.0 / r,
    };
    let resp_hz = response_lb.map(|r| if r >= 0.0 { r } else { -1.0 / r });
    let short_period = resp_hz.map(|r| r < 0.1).unwrap_or(false);

    let code = if rate >= 5000.0 {
        "J"
    } else if (1000.0..5000.0).contains(&rate) {
        if short_period {
            "F"
        } else {
            "G"
        }
    } else if (250.0..1000.0).contains(&rate) {
        if short_period {
            "C"
        } else {
            "D"
        }
    } else if (80.0..250.0).contains(&rate) {
        if short_period {
            "H"
        } else {
            "E"
        }
    } else if (10.0..80.0).contains(&rate) {
        if short_period {
            "B"
        } else {
            "S"
        }
    } else if rate > 1.0 && rate < 10.0 {
        "M"
    } else if rate > 0.5 && rate < 1.5 {
        "L"
    } else if (0.1..1.0).contains(&rate) {
        "V"
    } else if (0.01..0.1).contains(&rate) {
        "U"
    } else if (0.001..0.01).contains(&rate) {
        "W"
    } else if (0.0001..0.001).contains(&rate) {
        "R"
    } else if (0.00001..0.0001).contains(&rate) {
        "P"
    } else if (0.000001..0.00001).contains(&rate) {
        "T"
    } else {
        "Q"
    };
    code.to_string()
}
