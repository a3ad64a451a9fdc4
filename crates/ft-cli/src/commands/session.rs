//! `focus`, `relax` and `reset`: one button press each.

use std::io::Write;

use anyhow::{Context, Result};
use ft_core::{Clock, ControllerLink, SessionKind, SessionUi, Store};

/// A button on the session UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    Focus,
    Relax,
    Reset(SessionKind),
}

pub fn run<W, S, C, L>(writer: &mut W, ui: &mut SessionUi<S, C, L>, press: Press) -> Result<()>
where
    W: Write,
    S: Store,
    C: Clock,
    L: ControllerLink,
{
    let view = match press {
        Press::Focus => ui.press_focus(),
        Press::Relax => ui.press_relax(),
        Press::Reset(SessionKind::Focus) => ui.reset_focus(),
        Press::Reset(SessionKind::Relax) => ui.reset_relax(),
    }
    .context("failed to update session state")?;

    write!(writer, "{view}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use ft_core::{ControllerMessage, FocusCommand, ManualClock, MemoryStore};
    use insta::assert_snapshot;

    fn press(ui: &mut SessionUi<&MemoryStore, ManualClock, Vec<ControllerMessage>>, button: Press) -> String {
        let mut output = Vec::new();
        run(&mut output, ui, button).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn focus_then_relax() {
        let store = MemoryStore::new();
        let clock = ManualClock::starting_at(0);
        let mut ui = SessionUi::open(&store, clock.clone(), Vec::new(), 10_000).unwrap();

        assert_snapshot!(press(&mut ui, Press::Focus), @r"
        mode: FOCUSING
        focus 00:00:00  ░░░░░░░░░░░░░░░░░░░░    0%  FOCUSING
        relax 00:00:00  ░░░░░░░░░░░░░░░░░░░░    0%  RELAX
        ");

        clock.set(5_000);
        assert_snapshot!(press(&mut ui, Press::Relax), @r"
        mode: RELAXING
        focus 00:00:05  ██████████░░░░░░░░░░   50%  FOCUS
        relax 00:00:00  ░░░░░░░░░░░░░░░░░░░░    0%  RELAXING
        ");

        assert_eq!(
            ui.link().first(),
            Some(&ControllerMessage::Focus {
                state: FocusCommand::Focusing
            })
        );
    }

    #[test]
    fn reset_focus_zeroes_only_focus() {
        let store = MemoryStore::new();
        let clock = ManualClock::starting_at(0);
        let mut ui = SessionUi::open(&store, clock.clone(), Vec::new(), 10_000).unwrap();
        press(&mut ui, Press::Relax);
        clock.set(12_000);
        press(&mut ui, Press::Relax);

        assert_snapshot!(press(&mut ui, Press::Reset(SessionKind::Focus)), @r"
        mode: RELAXING
        focus 00:00:00  ░░░░░░░░░░░░░░░░░░░░    0%  FOCUS
        relax 00:00:12  ████████████████████  100%  RELAX
        ");
        assert_eq!(ui.link().last(), Some(&ControllerMessage::ResetFocus));
    }
}
