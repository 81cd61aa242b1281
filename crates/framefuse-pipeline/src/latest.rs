use std::collections::btree_map::{self, BTreeMap};

use framefuse_frame::Frame;

use crate::channel::{ChannelId, TaggedFrame};

/// Most recent frame per channel, as seen by the combiner loop.
///
/// Only the loop that owns it writes to it; combination steps get a shared
/// reference. Iteration is in channel-name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestFrames {
    frames: BTreeMap<ChannelId, Frame>,
    last_updated: Option<ChannelId>,
}

impl LatestFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest frame of `channel`, if it has produced one.
    pub fn get(&self, channel: &str) -> Option<&Frame> {
        self.frames.get(channel)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.frames.contains_key(channel)
    }

    /// Number of channels with a value.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Channel whose frame arrived most recently.
    pub fn last_updated(&self) -> Option<&ChannelId> {
        self.last_updated.as_ref()
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.frames.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, ChannelId, Frame> {
        self.frames.iter()
    }

    pub(crate) fn update(&mut self, tagged: TaggedFrame) {
        self.last_updated = Some(tagged.channel.clone());
        self.frames.insert(tagged.channel, tagged.frame);
    }

    pub(crate) fn remove(&mut self, channel: &str) -> Option<Frame> {
        if self.last_updated.as_ref().map(ChannelId::as_str) == Some(channel) {
            self.last_updated = None;
        }
        self.frames.remove(channel)
    }
}

impl<'a> IntoIterator for &'a LatestFrames {
    type Item = (&'a ChannelId, &'a Frame);
    type IntoIter = btree_map::Iter<'a, ChannelId, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(channel: &str, value: i16) -> TaggedFrame {
        TaggedFrame::new(channel.into(), Frame::new([1], vec![value]).unwrap())
    }

    #[test]
    fn update_overwrites_per_channel() {
        let mut latest = LatestFrames::new();
        latest.update(tagged("a", 1));
        latest.update(tagged("b", 5));
        latest.update(tagged("a", 2));

        assert_eq!(latest.len(), 2);
        assert_eq!(latest.get("a").unwrap().as_i16(), Some(&[2i16][..]));
        assert_eq!(latest.last_updated().map(ChannelId::as_str), Some("a"));
        let names: Vec<_> = latest.channels().map(ChannelId::as_str).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn remove_clears_last_updated() {
        let mut latest = LatestFrames::new();
        latest.update(tagged("a", 1));
        assert!(latest.remove("a").is_some());
        assert!(latest.remove("a").is_none());
        assert!(latest.is_empty());
        assert!(latest.last_updated().is_none());
    }
}
