// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `video_toggle`.

use crate::catalog::{
    Command, CommandContext, CommandError, InteractionSnapshot, MediaResidencyCheck,
    ValidationError,
};
use canvas_scene::NodeId;
use std::any::Any;

/// `video_toggle`: toggles or sets a video node's paused state. Playback
/// rejection (autoplay policy) is a host/renderer concern — the graph's
/// `paused` field is the intent, not a guarantee the media element obeyed
/// it.
#[derive(Debug)]
pub struct VideoToggle {
    /// Target node.
    pub node_id: NodeId,
    /// Explicit value; `None` toggles the current state.
    pub paused: Option<bool>,
    previous: Option<bool>,
}

impl VideoToggle {
    /// Construct a pending toggle command.
    pub fn new(node_id: NodeId, paused: Option<bool>) -> Self {
        Self {
            node_id,
            paused,
            previous: None,
        }
    }
}

impl Command for VideoToggle {
    fn command_type(&self) -> &'static str {
        "video_toggle"
    }

    fn validate(&self, ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        let node = ctx
            .graph
            .get(&self.node_id)
            .ok_or_else(|| ValidationError::new(format!("video_toggle: node not found: {}", self.node_id)))?;
        if node.variant.as_video().is_none() {
            return Err(ValidationError::new(format!(
                "video_toggle: not a video node: {}",
                self.node_id
            )));
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
        self.previous = ctx
            .graph
            .get(&self.node_id)
            .and_then(|n| n.variant.as_video())
            .map(|v| v.paused);
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let node = ctx.require_mut(&self.node_id)?;
        let Some(video) = node.variant.as_video_mut() else {
            return Err(CommandError::InvalidType {
                command: "video_toggle",
                id: self.node_id.clone(),
            });
        };
        video.paused = self.paused.unwrap_or(!video.paused);
        let id = self.node_id.clone();
        ctx.graph.mark_updated(&id);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        let Some(prev) = self.previous else {
            return;
        };
        if let Some(node) = ctx.graph.get_mut(&self.node_id) {
            if let Some(video) = node.variant.as_video_mut() {
                video.paused = prev;
            }
            ctx.graph.mark_updated(&self.node_id);
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
    use canvas_scene::{GraphId, Node, NodeVariant, SceneGraph, VideoFields};
    use crate::catalog::Origin;

    #[test]
    fn toggle_flips_paused_state() {
        let mut graph = SceneGraph::new(GraphId(1));
        let id = graph
            .add(Node::new(NodeId::Real(1), NodeVariant::Video(VideoFields::default())))
            .unwrap();

        let mut cmd = VideoToggle::new(id.clone(), None);
        let mut c = CommandContext::new(&mut graph, Origin::Local);
        cmd.prepare_undo(&c, None, &|_| false);
        cmd.execute(&mut c).unwrap();
        assert!(c.graph.get(&id).unwrap().variant.as_video().unwrap().paused);
        cmd.undo(&mut c);
        assert!(!c.graph.get(&id).unwrap().variant.as_video().unwrap().paused);
    }

    #[test]
    fn validate_rejects_non_video_node() {
        let mut graph = SceneGraph::new(GraphId(1));
        let id = graph.add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();
        let cmd = VideoToggle::new(id, None);
        let c = CommandContext::new(&mut graph, Origin::Local);
        assert!(cmd.validate(&c).is_err());
    }
}
