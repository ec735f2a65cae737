use super::value_attribute;
use sdp_types::{Direction, UnknownAttribute};
use std::fmt;

/// Typed value of a `a=<name>:<value>` attribute which `sdp-types` keeps as [`UnknownAttribute`]
pub trait AttributeValue: Sized + fmt::Display {
    const NAME: &'static str;

    fn parse_value(value: &str) -> Option<Self>;

    fn to_attribute(&self) -> UnknownAttribute {
        value_attribute(Self::NAME, &self.to_string())
    }
}

/// All well formed attributes of type `T`, malformed ones are skipped
pub fn typed<T: AttributeValue>(attributes: &[UnknownAttribute]) -> impl Iterator<Item = T> + '_ {
    attributes
        .iter()
        .filter(|attr| attr.name == T::NAME)
        .filter_map(|attr| {
            let value = attr.value.as_deref()?;
            let parsed = T::parse_value(value);

            if parsed.is_none() {
                log::debug!("ignoring malformed a={}:{value}", T::NAME);
            }

            parsed
        })
}

fn direction_from_name(name: &str) -> Option<Direction> {
    match name {
        "sendrecv" => Some(Direction::SendRecv),
        "sendonly" => Some(Direction::SendOnly),
        "recvonly" => Some(Direction::RecvOnly),
        "inactive" => Some(Direction::Inactive),
        _ => None,
    }
}

/// `a=extmap:<id>[/<direction>] <uri> [<extension attributes>]`
#[derive(Debug, Clone)]
pub struct ExtMap {
    pub id: u16,
    pub direction: Option<Direction>,
    pub uri: String,
    pub attributes: Option<String>,
}

impl AttributeValue for ExtMap {
    const NAME: &'static str = "extmap";

    fn parse_value(value: &str) -> Option<Self> {
        let mut parts = value.trim().splitn(3, ' ');

        let first = parts.next()?;

        let (id, direction) = match first.split_once('/') {
            Some((id, direction)) => (id, Some(direction_from_name(direction)?)),
            None => (first, None),
        };

        Some(Self {
            id: id.parse().ok()?,
            direction,
            uri: parts.next().filter(|uri| !uri.is_empty())?.to_owned(),
            attributes: parts.next().map(ToOwned::to_owned),
        })
    }
}

impl fmt::Display for ExtMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;

        if let Some(direction) = self.direction {
            write!(f, "/{}", direction.as_str())?;
        }

        write!(f, " {}", self.uri)?;

        if let Some(attributes) = &self.attributes {
            write!(f, " {attributes}")?;
        }

        Ok(())
    }
}

/// `a=rtcp-fb:<payload type|*> <feedback>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpFeedback {
    /// `None` is the wildcard `*`
    pub payload: Option<u8>,
    pub value: String,
}

impl AttributeValue for RtcpFeedback {
    const NAME: &'static str = "rtcp-fb";

    fn parse_value(value: &str) -> Option<Self> {
        let (payload, feedback) = value.trim().split_once(' ')?;

        let payload = match payload {
            "*" => None,
            pt => Some(pt.parse().ok()?),
        };

        Some(Self {
            payload,
            value: feedback.trim().to_owned(),
        })
    }
}

impl fmt::Display for RtcpFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload {
            Some(pt) => write!(f, "{} {}", pt, self.value),
            None => write!(f, "* {}", self.value),
        }
    }
}

/// `a=group:<semantics> <mid>*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub semantics: String,
    pub mids: Vec<String>,
}

impl AttributeValue for Group {
    const NAME: &'static str = "group";

    fn parse_value(value: &str) -> Option<Self> {
        let mut parts = value.split_ascii_whitespace();

        Some(Self {
            semantics: parts.next()?.to_owned(),
            mids: parts.map(ToOwned::to_owned).collect(),
        })
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.semantics)?;

        for mid in &self.mids {
            write!(f, " {mid}")?;
        }

        Ok(())
    }
}

/// `a=sctpmap:<number> <app> [<streams>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SctpMap {
    pub number: u16,
    pub app: String,
    pub streams: Option<u32>,
}

impl AttributeValue for SctpMap {
    const NAME: &'static str = "sctpmap";

    fn parse_value(value: &str) -> Option<Self> {
        let mut parts = value.split_ascii_whitespace();

        let number = parts.next()?.parse().ok()?;
        let app = parts.next()?.to_owned();

        let streams = match parts.next() {
            Some(streams) => Some(streams.parse().ok()?),
            None => None,
        };

        Some(Self {
            number,
            app,
            streams,
        })
    }
}

impl fmt::Display for SctpMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.app)?;

        if let Some(streams) = self.streams {
            write!(f, " {streams}")?;
        }

        Ok(())
    }
}

/// `a=setup:<role>` (RFC 4145)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setup {
    Active,
    Passive,
    ActPass,
    HoldConn,
}

impl Setup {
    /// Role to put into the answer of an offer using this role
    pub fn answer(self) -> Self {
        match self {
            Self::ActPass | Self::Passive => Self::Active,
            Self::Active => Self::Passive,
            Self::HoldConn => Self::HoldConn,
        }
    }
}

impl AttributeValue for Setup {
    const NAME: &'static str = "setup";

    fn parse_value(value: &str) -> Option<Self> {
        match value.trim() {
            "active" => Some(Self::Active),
            "passive" => Some(Self::Passive),
            "actpass" => Some(Self::ActPass),
            "holdconn" => Some(Self::HoldConn),
            _ => None,
        }
    }
}

impl fmt::Display for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Passive => "passive",
            Self::ActPass => "actpass",
            Self::HoldConn => "holdconn",
        })
    }
}
