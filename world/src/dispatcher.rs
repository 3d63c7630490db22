//! Pending world mutations flushed once per tick.

use std::collections::VecDeque;

use civitas_core::Command;

/// First-in first-out queue of deferred commands.
///
/// Commands enqueued while the queue is being flushed run in the same flush,
/// after everything queued before them.
#[derive(Debug, Default)]
pub(crate) struct Dispatcher {
    queue: VecDeque<Command>,
}

impl Dispatcher {
    pub(crate) fn dispatch(&mut self, command: Command) {
        self.queue.push_back(command);
    }

    pub(crate) fn pop(&mut self) -> Option<Command> {
        self.queue.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Command> {
        self.queue.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civitas_core::{DisasterKind, TilePos};

    #[test]
    fn commands_leave_in_append_order() {
        let mut dispatcher = Dispatcher::default();
        dispatcher.dispatch(Command::ClearLand {
            pos: TilePos::new(1, 1),
        });
        dispatcher.dispatch(Command::Disaster {
            pos: TilePos::new(2, 2),
            kind: DisasterKind::Fire,
        });

        assert_eq!(
            dispatcher.pop(),
            Some(Command::ClearLand {
                pos: TilePos::new(1, 1)
            })
        );
        dispatcher.dispatch(Command::ClearLand {
            pos: TilePos::new(3, 3),
        });
        assert!(matches!(
            dispatcher.pop(),
            Some(Command::Disaster { .. })
        ));
        assert_eq!(dispatcher.len(), 1);
        assert!(matches!(dispatcher.pop(), Some(Command::ClearLand { .. })));
        assert!(dispatcher.pop().is_none());
    }
}
