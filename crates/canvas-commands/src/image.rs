// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `image_upload_complete`.
//!
//! Cache promotion (local → server entry) is `canvas-media`'s job; this
//! command only updates graph nodes, so it stays applicable whether the
//! upload happened on this client or was learned about via broadcast.

use crate::catalog::{
    Command, CommandContext, CommandError, InteractionSnapshot, MediaResidencyCheck,
    ValidationError,
};
use canvas_scene::NodeId;
use std::any::Any;

/// `image_upload_complete`: every node sharing `hash` gains the server URL.
/// Commutes with position/size edits and is idempotent.
#[derive(Debug)]
pub struct ImageUploadComplete {
    /// Content hash the upload was for.
    pub hash: String,
    /// Server URL to assign.
    pub server_url: String,
    /// Server-assigned filename, if known. The wire shim in
    /// `canvas-protocol` is responsible for accepting either
    /// `serverFilename` or `filename` before constructing this command.
    pub server_filename: Option<String>,
    previous: Option<Vec<(NodeId, Option<String>, Option<String>)>>,
}

impl ImageUploadComplete {
    /// Construct a pending upload-complete command.
    pub fn new(hash: String, server_url: String, server_filename: Option<String>) -> Self {
        Self {
            hash,
            server_url,
            server_filename,
            previous: None,
        }
    }

    fn matching_ids(ctx: &CommandContext<'_>, hash: &str) -> Vec<NodeId> {
        ctx.graph
            .nodes()
            .filter(|n| {
                n.variant
                    .as_image()
                    .and_then(|img| img.hash.as_deref())
                    == Some(hash)
            })
            .map(|n| n.base.id.clone())
            .collect()
    }
}

impl Command for ImageUploadComplete {
    fn command_type(&self) -> &'static str {
        "image_upload_complete"
    }

    fn validate(&self, _ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.hash.is_empty() {
            return Err(ValidationError::new("image_upload_complete: empty hash"));
        }
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        _initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        if self.previous.is_some() {
            return;
        }
        let ids = Self::matching_ids(ctx, &self.hash);
        self.previous = Some(
            ids.into_iter()
                .map(|id| {
                    let (url, filename) = ctx
                        .graph
                        .get(&id)
                        .and_then(|n| n.variant.as_image())
                        .map(|img| (img.server_url.clone(), img.server_filename.clone()))
                        .unwrap_or((None, None));
                    (id, url, filename)
                })
                .collect(),
        );
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let ids = Self::matching_ids(ctx, &self.hash);
        for id in ids {
            if let Some(node) = ctx.graph.get_mut(&id) {
                if let Some(img) = node.variant.as_image_mut() {
                    img.server_url = Some(self.server_url.clone());
                    if let Some(filename) = &self.server_filename {
                        img.server_filename = Some(filename.clone());
                    }
                }
                ctx.graph.mark_updated(&id);
            }
        }
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        let Some(previous) = self.previous.clone() else {
            return;
        };
        for (id, url, filename) in previous {
            if let Some(node) = ctx.graph.get_mut(&id) {
                if let Some(img) = node.variant.as_image_mut() {
                    img.server_url = url;
                    img.server_filename = filename;
                }
                ctx.graph.mark_updated(&id);
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::Origin;
    use canvas_scene::{GraphId, ImageFields, Node, NodeVariant, SceneGraph};

    #[test]
    fn fanout_updates_every_node_sharing_hash() {
        let mut graph = SceneGraph::new(GraphId(1));
        let mut img1 = ImageFields::default();
        img1.hash = Some("abc".into());
        let mut img2 = ImageFields::default();
        img2.hash = Some("abc".into());
        let n1 = graph.add(Node::new(NodeId::Real(1), NodeVariant::Image(img1))).unwrap();
        let n2 = graph.add(Node::new(NodeId::Real(2), NodeVariant::Image(img2))).unwrap();

        let mut cmd = ImageUploadComplete::new("abc".into(), "/m/abc.png".into(), Some("abc.png".into()));
        let mut c = CommandContext::new(&mut graph, Origin::Remote);
        cmd.prepare_undo(&c, None, &|_| false);
        cmd.execute(&mut c).unwrap();

        for id in [&n1, &n2] {
            let img = c.graph.get(id).unwrap().variant.as_image().unwrap();
            assert_eq!(img.server_url.as_deref(), Some("/m/abc.png"));
        }
    }
}
