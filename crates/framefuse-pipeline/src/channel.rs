//! Channel identity and the unit carried on the hand-off queue.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use framefuse_frame::Frame;

/// Unique name of one producing channel.
///
/// Cheap to clone: every tagged frame carries one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(Arc<str>);

impl ChannelId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ChannelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ChannelId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// A decoded frame paired with the channel that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedFrame {
    pub channel: ChannelId,
    pub frame: Frame,
}

impl TaggedFrame {
    pub fn new(channel: ChannelId, frame: Frame) -> Self {
        Self { channel, frame }
    }
}
