use crate::{
    bet::{BetOption, Outcome, PIVOT},
    controller::{GameSnapshot, Phase},
};
use alloy_primitives::{Address, U256, utils::format_ether};
use color_eyre::eyre::{Result, WrapErr, eyre};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{prelude::*, widgets::*};
use std::io::stdout;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    PlaceBet(BetOption),
    Resolve,
    Refresh,
    PlayAgain,
    Redraw,
}

#[derive(Default)]
pub struct UiState {
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // one Terminal for the whole session so buffers diff across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &GameSnapshot) -> Result<()> {
    if let Some(term) = state.terminal.as_mut() {
        term.draw(|f| ui(f, snap))?;
    }
    Ok(())
}

pub fn input_event_stream() -> EventStream {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut EventStream) -> Result<Event> {
    events
        .next()
        .await
        .ok_or_else(|| eyre!("terminal input closed"))?
        .wrap_err("reading terminal input failed")
}

pub fn interpret_event(event: Event) -> Option<UserEvent> {
    match event {
        Event::Key(key) => interpret_key(key),
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

fn interpret_key(key: KeyEvent) -> Option<UserEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c')).then_some(UserEvent::Quit);
    }
    let ev = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => UserEvent::Quit,
        KeyCode::Char('u') => UserEvent::PlaceBet(BetOption::Under),
        KeyCode::Char('e') | KeyCode::Char('7') => UserEvent::PlaceBet(BetOption::Exact),
        KeyCode::Char('o') => UserEvent::PlaceBet(BetOption::Over),
        KeyCode::Char('r') | KeyCode::Char(' ') => UserEvent::Resolve,
        KeyCode::Char('f') => UserEvent::Refresh,
        KeyCode::Char('p') | KeyCode::Enter => UserEvent::PlayAgain,
        _ => return None,
    };
    Some(ev)
}

fn ui(f: &mut Frame, snap: &GameSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Length(9), // dice
            Constraint::Length(5), // bet options
            Constraint::Length(4), // status
            Constraint::Length(3), // transaction
            Constraint::Min(3),    // rules + help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    draw_dice(f, chunks[1], snap);
    draw_options(f, chunks[2], snap);
    draw_status(f, chunks[3], snap);
    draw_transaction(f, chunks[4], snap);
    draw_help(f, chunks[5]);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &GameSnapshot) {
    let account = snap
        .account
        .map(short_address)
        .unwrap_or_else(|| "not connected".to_string());
    let contract = snap
        .contract
        .map(short_address)
        .unwrap_or_else(|| "not deployed".to_string());
    let text = format!(
        "Account: {} | Contract: {} | House: {}",
        account,
        contract,
        house_balance_text(snap.house_balance)
    );
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Seven Up Seven Down"));
    f.render_widget(widget, area);
}

fn draw_dice(f: &mut Frame, area: Rect, snap: &GameSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(13),
            Constraint::Length(13),
            Constraint::Min(20),
        ])
        .split(area);

    let die_style = if snap.rolling {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    for (col, face) in [snap.dice_faces.first, snap.dice_faces.second]
        .into_iter()
        .enumerate()
    {
        let lines: Vec<Line> = pips(face).iter().map(|row| Line::from(*row)).collect();
        let die = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .style(die_style)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(die, cols[col]);
    }

    let mut lines = vec![Line::from(format!("Sum: {}", snap.dice_sum))];
    match snap.phase {
        Phase::Resolving => lines.push(Line::from("Rolling...")),
        Phase::Result => {
            if let Some(result) = snap.outcome {
                lines.push(outcome_line(result, snap.payout));
            }
        }
        Phase::Betting | Phase::Placing => {}
    }
    let summary = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Roll"));
    f.render_widget(summary, cols[2]);
}

fn outcome_line(result: Outcome, payout: u8) -> Line<'static> {
    match result {
        Outcome::Win => Line::from(Span::styled(
            format!("You won! Payout {payout}x"),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Outcome::Lose => Line::from(Span::styled(
            "You lost".to_string(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
    }
}

fn draw_options(f: &mut Frame, area: Rect, snap: &GameSnapshot) {
    let mut spans = Vec::new();
    for option in BetOption::ALL {
        let selected = snap.selected_option == Some(option)
            || snap.active_bet.is_some_and(|bet| bet.is_pending() && bet.option == option);
        let mut style = if snap.can_place {
            Style::default()
        } else {
            Style::default().add_modifier(Modifier::DIM)
        };
        if selected {
            style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        spans.push(Span::styled(
            format!(" [{}] {} ({}x) ", option_key(option), option, option.payout_multiplier()),
            style,
        ));
    }
    let mut lines = vec![Line::from(spans)];
    lines.push(Line::from(active_bet_text(snap)));
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Bet"));
    f.render_widget(widget, area);
}

fn active_bet_text(snap: &GameSnapshot) -> String {
    match (snap.phase, snap.active_bet) {
        (Phase::Placing, _) => "Placing bet...".to_string(),
        (Phase::Resolving, _) => "Resolving bet...".to_string(),
        (_, Some(bet)) if bet.is_pending() => {
            format!("Active bet: {}. Press r to roll.", bet.option)
        }
        (Phase::Result, _) => "Press p to play again.".to_string(),
        _ => "Choose an option to place a bet.".to_string(),
    }
}

fn draw_status(f: &mut Frame, area: Rect, snap: &GameSnapshot) {
    let widget = match &snap.last_error {
        Some(message) => Paragraph::new(message.clone())
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Error"))
            .style(Style::default().fg(Color::Red)),
        None => Paragraph::new(phase_text(snap.phase))
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green)),
    };
    f.render_widget(widget, area);
}

fn phase_text(phase: Phase) -> &'static str {
    match phase {
        Phase::Betting => "Ready",
        Phase::Placing => "Waiting for the bet to confirm",
        Phase::Resolving => "Waiting for the roll to confirm",
        Phase::Result => "Round finished",
    }
}

fn draw_transaction(f: &mut Frame, area: Rect, snap: &GameSnapshot) {
    let text = match (&snap.transaction_url, snap.transaction_hash) {
        (Some(url), _) => url.clone(),
        (None, Some(hash)) => format!("{hash:#x}"),
        (None, None) => "-".to_string(),
    };
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Last transaction"));
    f.render_widget(widget, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(format!(
            "Two dice are rolled on chain. Under {PIVOT} and Over {PIVOT} pay 2x, exactly {PIVOT} pays 5x."
        )),
        Line::from(
            "u Under | e/7 Exact | o Over | r/Space roll | f refresh | p/Enter play again | q/Esc quit",
        ),
    ];
    let help = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn option_key(option: BetOption) -> char {
    match option {
        BetOption::Under => 'u',
        BetOption::Exact => 'e',
        BetOption::Over => 'o',
    }
}

/// Three rows of pips for a die face; anything outside 1..=6 renders blank.
fn pips(face: u8) -> [&'static str; 3] {
    match face {
        1 => ["     ", "  ●  ", "     "],
        2 => ["●    ", "     ", "    ●"],
        3 => ["●    ", "  ●  ", "    ●"],
        4 => ["●   ●", "     ", "●   ●"],
        5 => ["●   ●", "  ●  ", "●   ●"],
        6 => ["●   ●", "●   ●", "●   ●"],
        _ => ["     ", "     ", "     "],
    }
}

fn short_address(address: Address) -> String {
    let full = format!("{address:#x}");
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

fn house_balance_text(balance: Option<U256>) -> String {
    match balance {
        Some(wei) => format!("{} MON", format_ether(wei)),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::bet::{Bet, DiceFaces};
    use alloy_primitives::address;
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn snapshot(phase: Phase) -> GameSnapshot {
        GameSnapshot {
            phase,
            selected_option: None,
            dice_faces: DiceFaces::default(),
            dice_sum: 2,
            outcome: None,
            payout: 0,
            last_error: None,
            transaction_hash: None,
            transaction_url: None,
            active_bet: None,
            account: Some(address!("0x00000000000000000000000000000000000a11ce")),
            contract: Some(address!("0xB6B9918C5880f7a1A4C65c4C4B6297956B4c39AD")),
            house_balance: Some(U256::from(1_500_000_000_000_000_000u64)),
            rolling: false,
            can_place: phase == Phase::Betting,
            can_resolve: false,
            can_reset: phase == Phase::Result,
        }
    }

    fn render(snap: &GameSnapshot) -> String {
        let mut terminal = Terminal::new(TestBackend::new(110, 40)).unwrap();
        terminal.draw(|f| ui(f, snap)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn interpret_event__maps_game_keys() {
        assert_eq!(
            interpret_event(key(KeyCode::Char('u'))),
            Some(UserEvent::PlaceBet(BetOption::Under))
        );
        assert_eq!(
            interpret_event(key(KeyCode::Char('7'))),
            Some(UserEvent::PlaceBet(BetOption::Exact))
        );
        assert_eq!(
            interpret_event(key(KeyCode::Char('o'))),
            Some(UserEvent::PlaceBet(BetOption::Over))
        );
        assert_eq!(interpret_event(key(KeyCode::Char(' '))), Some(UserEvent::Resolve));
        assert_eq!(interpret_event(key(KeyCode::Char('f'))), Some(UserEvent::Refresh));
        assert_eq!(interpret_event(key(KeyCode::Enter)), Some(UserEvent::PlayAgain));
        assert_eq!(interpret_event(key(KeyCode::Esc)), Some(UserEvent::Quit));
        assert_eq!(interpret_event(key(KeyCode::Char('x'))), None);
    }

    #[test]
    fn interpret_event__ctrl_c_quits() {
        let ev = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));

        assert_eq!(interpret_event(ev), Some(UserEvent::Quit));
    }

    #[test]
    fn interpret_event__ignores_key_release() {
        let mut release = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;

        assert_eq!(interpret_event(Event::Key(release)), None);
    }

    #[test]
    fn pips__count_matches_face() {
        for face in 1..=6u8 {
            let count: usize = pips(face).iter().map(|row| row.matches('●').count()).sum();
            assert_eq!(count, usize::from(face));
        }
    }

    #[test]
    fn house_balance_text__formats_ether() {
        assert_eq!(
            house_balance_text(Some(U256::from(1_500_000_000_000_000_000u64))),
            "1.500000000000000000 MON"
        );
        assert_eq!(house_balance_text(None), "N/A");
    }

    #[test]
    fn ui__result_shows_outcome_and_payout() {
        // given
        let mut snap = snapshot(Phase::Result);
        snap.dice_faces = DiceFaces::new(3, 4);
        snap.dice_sum = 7;
        snap.outcome = Some(Outcome::Win);
        snap.payout = 5;
        snap.active_bet = Some(Bet::resolved(BetOption::Exact, 7));

        // when
        let screen = render(&snap);

        // then
        assert!(screen.contains("Sum: 7"));
        assert!(screen.contains("You won! Payout 5x"));
        assert!(screen.contains("Press p to play again."));
    }

    #[test]
    fn ui__error_replaces_status() {
        // given
        let mut snap = snapshot(Phase::Betting);
        snap.last_error = Some("You have an active bet. Please resolve it first!".to_string());

        // when
        let screen = render(&snap);

        // then
        assert!(screen.contains("Please resolve it first!"));
        assert!(!screen.contains("Ready"));
    }
}
