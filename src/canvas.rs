//! Drawing sink for execution timelines.
//!
//! The machine calls a [`Canvas`] as each drawable task executes. The
//! canvas has no way to answer back; renderers that want to lay the
//! timeline out later can record the calls with [`DrawRecorder`].

use std::any::Any;

use crate::task::NodeIndex;
use crate::time::Time;

/// Receives one call per drawable Start, Compute, Put and Sleep task.
pub trait Canvas {
    fn draw_start_task(&mut self, node: NodeIndex, time: Time);

    fn draw_compute_task(&mut self, node: NodeIndex, start: Time, end: Time);

    /// A Put whose sender waits for the arrival at `dst`.
    fn draw_blocking_put_task(&mut self, src: NodeIndex, dst: NodeIndex, start: Time, end: Time);

    /// A Put whose sender is released at `switch`, before the message
    /// reaches `dst` at `end`.
    fn draw_non_blocking_put_task(
        &mut self,
        src: NodeIndex,
        dst: NodeIndex,
        start: Time,
        switch: Time,
        end: Time,
    );

    fn draw_sleep_task(&mut self, node: NodeIndex, start: Time, end: Time);

    /// Downcast support for [`Machine::canvas`](crate::machine::Machine::canvas).
    fn as_any(&self) -> &dyn Any;
}

/// A single recorded draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum DrawCommand {
    Start {
        node: NodeIndex,
        time: Time,
    },
    Compute {
        node: NodeIndex,
        start: Time,
        end: Time,
    },
    BlockingPut {
        src: NodeIndex,
        dst: NodeIndex,
        start: Time,
        end: Time,
    },
    NonBlockingPut {
        src: NodeIndex,
        dst: NodeIndex,
        start: Time,
        switch: Time,
        end: Time,
    },
    Sleep {
        node: NodeIndex,
        start: Time,
        end: Time,
    },
}

impl DrawCommand {
    /// The latest time the command covers.
    pub fn end(&self) -> Time {
        match *self {
            DrawCommand::Start { time, .. } => time,
            DrawCommand::Compute { end, .. }
            | DrawCommand::BlockingPut { end, .. }
            | DrawCommand::NonBlockingPut { end, .. }
            | DrawCommand::Sleep { end, .. } => end,
        }
    }
}

/// Canvas that keeps every draw call in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawRecorder {
    commands: Vec<DrawCommand>,
}

impl DrawRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Latest time drawn, i.e. the width of the timeline.
    pub fn horizon(&self) -> Time {
        self.commands
            .iter()
            .map(DrawCommand::end)
            .max()
            .unwrap_or(Time::ZERO)
    }
}

impl Canvas for DrawRecorder {
    fn draw_start_task(&mut self, node: NodeIndex, time: Time) {
        self.commands.push(DrawCommand::Start { node, time });
    }

    fn draw_compute_task(&mut self, node: NodeIndex, start: Time, end: Time) {
        self.commands.push(DrawCommand::Compute { node, start, end });
    }

    fn draw_blocking_put_task(&mut self, src: NodeIndex, dst: NodeIndex, start: Time, end: Time) {
        self.commands
            .push(DrawCommand::BlockingPut { src, dst, start, end });
    }

    fn draw_non_blocking_put_task(
        &mut self,
        src: NodeIndex,
        dst: NodeIndex,
        start: Time,
        switch: Time,
        end: Time,
    ) {
        self.commands.push(DrawCommand::NonBlockingPut {
            src,
            dst,
            start,
            switch,
            end,
        });
    }

    fn draw_sleep_task(&mut self, node: NodeIndex, start: Time, end: Time) {
        self.commands.push(DrawCommand::Sleep { node, start, end });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_keeps_call_order() {
        let mut canvas = DrawRecorder::new();
        assert_eq!(canvas.horizon(), Time::ZERO);

        canvas.draw_start_task(0, Time::ZERO);
        canvas.draw_non_blocking_put_task(0, 1, Time::ZERO, Time::new(5), Time::new(40));
        canvas.draw_compute_task(1, Time::new(40), Time::new(50));

        assert_eq!(canvas.len(), 3);
        assert_eq!(canvas.commands()[0], DrawCommand::Start { node: 0, time: Time::ZERO });
        assert!(matches!(
            canvas.commands()[1],
            DrawCommand::NonBlockingPut { switch, .. } if switch == Time::new(5)
        ));
        assert_eq!(canvas.horizon(), Time::new(50));
    }
}
