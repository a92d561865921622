//! Image lineage
//!
//! Provenance is stored as tags: the child carries `shipami:copied_from`
//! (one `region:id` pointer), the parent carries `shipami:copied_to` (a
//! comma-joined list of pointers). [`ImagePointer`] and [`CopiedTo`] are the
//! only place that encoding is parsed or produced.

use serde::Serialize;
use shipami_core::{Error, Result, Tag};
use shipami_ec2::SessionRegistry;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn, Instrument, Span};

use crate::resource::{tag_value, ImageRef};
use crate::tags::{self, TagStore};

/// `region:image-id` reference to an image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImagePointer {
    pub region: String,
    pub image_id: String,
}

impl ImagePointer {
    pub fn new(region: impl Into<String>, image_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            image_id: image_id.into(),
        }
    }
}

impl fmt::Display for ImagePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.region, self.image_id)
    }
}

impl FromStr for ImagePointer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(region), Some(image_id), None) if !region.is_empty() && !image_id.is_empty() => {
                Ok(Self::new(region, image_id))
            }
            (_, None, _) => Err(Error::parse(s, "expected region:image-id")),
            (_, Some(_), Some(_)) => Err(Error::parse(s, "more than one ':'")),
            _ => Err(Error::parse(s, "empty region or image id")),
        }
    }
}

/// Ordered, duplicate-free list of copy pointers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CopiedTo(Vec<ImagePointer>);

impl CopiedTo {
    /// Decode a tag value, skipping malformed entries
    pub fn parse_lossy(value: &str) -> Self {
        let mut copied_to = Self::default();
        for entry in tags::split_multi(value) {
            match entry.parse() {
                Ok(pointer) => copied_to.push(pointer),
                Err(e) => warn!("Ignoring {} entry: {}", tags::COPIED_TO, e),
            }
        }
        copied_to
    }

    pub fn push(&mut self, pointer: ImagePointer) {
        if !self.0.contains(&pointer) {
            self.0.push(pointer);
        }
    }

    pub fn contains(&self, pointer: &ImagePointer) -> bool {
        self.0.contains(pointer)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImagePointer> {
        self.0.iter()
    }
}

impl FromStr for CopiedTo {
    type Err = Error;

    /// Strict decode: any malformed entry fails
    fn from_str(s: &str) -> Result<Self> {
        let mut copied_to = Self::default();
        for entry in tags::split_multi(s) {
            copied_to.push(entry.parse()?);
        }
        Ok(copied_to)
    }
}

impl fmt::Display for CopiedTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&tags::join_multi(self.0.iter().map(ToString::to_string)))
    }
}

/// Lineage decoded from an image's tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineageInfo {
    pub managed: bool,
    pub release: Option<String>,
    pub copied_from: Option<ImagePointer>,
    pub copied_to: CopiedTo,
}

impl LineageInfo {
    pub fn from_tags(tag_set: &[Tag]) -> Self {
        let copied_from = tag_value(tag_set, tags::COPIED_FROM).and_then(|value| {
            value
                .parse::<ImagePointer>()
                .map_err(|e| warn!("Ignoring {} tag: {}", tags::COPIED_FROM, e))
                .ok()
        });

        Self {
            managed: tag_value(tag_set, tags::MANAGED).as_deref() == Some(tags::MANAGED_VALUE),
            release: tag_value(tag_set, tags::RELEASE).filter(|release| !release.is_empty()),
            copied_from,
            copied_to: tag_value(tag_set, tags::COPIED_TO)
                .map(|value| CopiedTo::parse_lossy(&value))
                .unwrap_or_default(),
        }
    }

    pub fn is_release(&self) -> bool {
        self.release.is_some()
    }

    /// Unmanaged images and releases need force to delete
    pub fn is_protected(&self) -> bool {
        !self.managed || self.is_release()
    }
}

/// Result of removing a child from its parent's `copied_to`
///
/// Repair is bookkeeping: every failure is reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineageRepair {
    /// Entry removed, others remain
    Updated { remaining: CopiedTo },
    /// Entry removed, tag deleted
    Cleared,
    /// Parent did not list the child
    NotLinked,
    /// Repair could not be carried out
    Skipped { reason: String },
}

/// Maintains the copied_from / copied_to pair
#[derive(Debug, Clone)]
pub struct LineageManager {
    sessions: SessionRegistry,
    tags: TagStore,
    span: Span,
}

impl LineageManager {
    pub fn new(sessions: SessionRegistry, span: Span) -> Self {
        Self {
            sessions,
            tags: TagStore::new(span.clone()),
            span,
        }
    }

    /// Record that `child` was copied from `parent`
    ///
    /// Appends the child to the parent's `copied_to`, then marks the child
    /// managed and points its `copied_from` at the parent.
    pub async fn link(&self, parent: &mut ImageRef, child: &mut ImageRef) -> Result<()> {
        let parent_pointer = parent.pointer();
        let child_pointer = child.pointer();

        async {
            debug!("linking {} -> {}", parent_pointer, child_pointer);
            self.tags
                .append(parent, tags::COPIED_TO, &child_pointer.to_string())
                .await?;
            self.mark_child(child, &parent_pointer).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Write the child side of the link
    pub async fn mark_child(&self, child: &mut ImageRef, parent: &ImagePointer) -> Result<()> {
        self.tags
            .set_many(
                child,
                &[
                    Tag::new(tags::MANAGED, tags::MANAGED_VALUE),
                    Tag::new(tags::COPIED_FROM, parent.to_string()),
                ],
            )
            .await
    }

    /// Parse a pointer and bind it to its region's client
    pub fn resolve(&self, pointer: &str) -> Result<ImageRef> {
        let pointer: ImagePointer = pointer.parse()?;
        Ok(self.resolve_pointer(&pointer))
    }

    pub fn resolve_pointer(&self, pointer: &ImagePointer) -> ImageRef {
        ImageRef::new(
            self.sessions.get(Some(&pointer.region)),
            pointer.image_id.clone(),
        )
    }

    /// Remove `child` from `parent`'s `copied_to`
    pub async fn unlink_as_parent(
        &self,
        parent: &mut ImageRef,
        child: &ImagePointer,
    ) -> LineageRepair {
        let repair = self
            .try_unlink(parent, child)
            .instrument(self.span.clone())
            .await
            .unwrap_or_else(|e| LineageRepair::Skipped {
                reason: e.to_string(),
            });

        self.span.in_scope(|| match &repair {
            LineageRepair::Updated { remaining } => debug!(
                "removed {} from {} {}; {} remaining",
                child,
                parent.id(),
                tags::COPIED_TO,
                remaining.len()
            ),
            LineageRepair::Cleared => {
                debug!("removed {} tag from {}", tags::COPIED_TO, parent.id())
            }
            LineageRepair::NotLinked => {
                debug!("{} does not list {} as a copy", parent.id(), child)
            }
            LineageRepair::Skipped { reason } => warn!(
                "Could not update {} on {}: {}",
                tags::COPIED_TO,
                parent.id(),
                reason
            ),
        });
        repair
    }

    async fn try_unlink(&self, parent: &mut ImageRef, child: &ImagePointer) -> Result<LineageRepair> {
        let current = self
            .tags
            .get(parent, tags::COPIED_TO)
            .await?
            .map(|value| CopiedTo::parse_lossy(&value))
            .unwrap_or_default();

        if !current.contains(child) {
            return Ok(LineageRepair::NotLinked);
        }

        let remaining = self
            .tags
            .remove_value(parent, tags::COPIED_TO, &child.to_string())
            .await?;

        Ok(match remaining {
            Some(value) => LineageRepair::Updated {
                remaining: CopiedTo::parse_lossy(&value),
            },
            None => LineageRepair::Cleared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipami_ec2::mock::MockEc2Cloud;

    #[test]
    fn test_pointer_round_trip() {
        let pointer: ImagePointer = "eu-west-1:ami-0abc".parse().unwrap();
        assert_eq!(pointer, ImagePointer::new("eu-west-1", "ami-0abc"));
        assert_eq!(pointer.to_string(), "eu-west-1:ami-0abc");
    }

    #[test]
    fn test_pointer_rejects_malformed() {
        for input in ["ami-0abc", "eu-west-1:ami:x", ":ami-1", "eu-west-1:", ""] {
            let err = input.parse::<ImagePointer>().unwrap_err();
            assert!(matches!(err, Error::Parse { .. }), "{input}");
        }
    }

    #[test]
    fn test_copied_to_dedupes_and_keeps_order() {
        let copied_to: CopiedTo = "us-east-1:ami-2,eu-west-1:ami-1,us-east-1:ami-2"
            .parse()
            .unwrap();
        assert_eq!(copied_to.len(), 2);
        assert_eq!(copied_to.to_string(), "us-east-1:ami-2,eu-west-1:ami-1");
    }

    #[test]
    fn test_copied_to_strict_vs_lossy() {
        assert!("eu-west-1:ami-1,garbage".parse::<CopiedTo>().is_err());
        assert_eq!(CopiedTo::parse_lossy("eu-west-1:ami-1,garbage").len(), 1);
    }

    #[test]
    fn test_lineage_info_protection() {
        let managed = vec![Tag::new(tags::MANAGED, "True")];
        assert!(!LineageInfo::from_tags(&managed).is_protected());

        let release = vec![
            Tag::new(tags::MANAGED, "True"),
            Tag::new(tags::RELEASE, "1.0.0"),
        ];
        assert!(LineageInfo::from_tags(&release).is_protected());

        let unmanaged = vec![Tag::new(tags::MANAGED, "yes")];
        assert!(LineageInfo::from_tags(&unmanaged).is_protected());
        assert!(LineageInfo::from_tags(&[]).is_protected());
    }

    #[test]
    fn test_lineage_info_ignores_bad_parent() {
        let info = LineageInfo::from_tags(&[
            Tag::new(tags::MANAGED, "True"),
            Tag::new(tags::COPIED_FROM, "not-a-pointer"),
        ]);
        assert!(info.managed);
        assert_eq!(info.copied_from, None);
    }

    #[tokio::test]
    async fn test_unlink_outcomes() {
        let cloud = MockEc2Cloud::new();
        let sessions = SessionRegistry::new("eu-west-1", cloud.factory());
        let manager = LineageManager::new(sessions.clone(), Span::none());
        let parent_id = cloud.register_image("eu-west-1", "foo", &[]);
        cloud.seed_tag(&parent_id, tags::COPIED_TO, "eu-west-1:ami-b,us-east-1:ami-c");

        let mut parent = ImageRef::new(sessions.get(None), &parent_id);
        let b = ImagePointer::new("eu-west-1", "ami-b");
        let c = ImagePointer::new("us-east-1", "ami-c");

        assert_eq!(
            manager.unlink_as_parent(&mut parent, &b).await,
            LineageRepair::Updated {
                remaining: "us-east-1:ami-c".parse().unwrap()
            }
        );
        assert_eq!(
            manager.unlink_as_parent(&mut parent, &b).await,
            LineageRepair::NotLinked
        );
        assert_eq!(
            manager.unlink_as_parent(&mut parent, &c).await,
            LineageRepair::Cleared
        );
        assert_eq!(cloud.image(&parent_id).unwrap().tag(tags::COPIED_TO), None);
    }

    #[tokio::test]
    async fn test_unlink_missing_parent_is_skipped() {
        let cloud = MockEc2Cloud::new();
        let sessions = SessionRegistry::new("eu-west-1", cloud.factory());
        let manager = LineageManager::new(sessions, Span::none());

        let mut parent = manager.resolve("eu-west-1:ami-gone").unwrap();
        let repair = manager
            .unlink_as_parent(&mut parent, &ImagePointer::new("eu-west-1", "ami-b"))
            .await;

        assert!(matches!(repair, LineageRepair::Skipped { .. }));
    }
}
