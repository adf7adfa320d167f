use alloy_primitives::hex;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Tabs},
    Frame,
};

use crate::api::provider::DataSourceStatus;
use crate::config::Config;
use crate::model::address::short_address;
use crate::model::units::{commify, format_ether, format_signed_units, format_units, truncate};
use crate::model::{Alert, AlertLevel, FetchState, Position, VaultInfo};
use crate::session::Session;

const TAB_TITLES: [&str; 4] = ["Overview", "Vault", "Deposits", "Alerts"];

pub struct UIState {
    pub selected_tab: usize,
    pub scroll_offset: usize,
    pub editing: bool,
    pub input_buffer: String,
}

impl UIState {
    pub fn new() -> Self {
        Self {
            selected_tab: 0,
            scroll_offset: 0,
            editing: false,
            input_buffer: String::new(),
        }
    }

    pub fn next_tab(&mut self) {
        self.selected_tab = (self.selected_tab + 1) % TAB_TITLES.len();
        self.scroll_offset = 0;
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(1);
    }

    pub fn start_editing(&mut self, current: &str) {
        self.editing = true;
        self.input_buffer = current.to_string();
        self.selected_tab = 0;
    }
}

impl Default for UIState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn draw(f: &mut Frame, state: &UIState, session: &Session, alerts: &[Alert], config: &Config) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.size());

    draw_header(f, chunks[0], session);

    let tabs = Tabs::new(TAB_TITLES.to_vec())
        .block(Block::default().borders(Borders::ALL))
        .select(state.selected_tab)
        .style(Style::default().fg(Color::Gray))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, chunks[1]);

    match state.selected_tab {
        0 => draw_overview(f, chunks[2], state, session),
        1 => draw_vault(f, chunks[2], session, config),
        2 => draw_deposits(f, chunks[2], state, session, config),
        _ => draw_alerts(f, chunks[2], state, alerts),
    }

    let help = if state.editing {
        "Type an address | Enter/Esc: done | Backspace: delete"
    } else {
        "Tab: switch | a: edit address | r/F5: refresh | h: help | s: save config | q: quit"
    };
    let footer = Paragraph::new(help)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[3]);
}

fn draw_header(f: &mut Frame, area: Rect, session: &Session) {
    let (status_text, status_color) = match &session.status {
        DataSourceStatus::Connected => ("connected".to_string(), Color::Green),
        DataSourceStatus::Disconnected => ("disconnected".to_string(), Color::Red),
        DataSourceStatus::Error(e) => (e.clone(), Color::Yellow),
    };

    let watched = session.watched().map(|a| short_address(&a)).unwrap_or_default();

    let header = Paragraph::new(Line::from(vec![
        Span::styled("Yearn Stats", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  "),
        Span::styled(watched, Style::default().fg(Color::Yellow)),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn label(text: &str) -> Span<'static> {
    Span::styled(format!("{:<16}", text), Style::default().fg(Color::Gray))
}

fn slot_span<T>(slot: &FetchState<T>, render: impl Fn(&T) -> String) -> Span<'static> {
    match slot {
        FetchState::Ready(value) => Span::styled(render(value), Style::default().fg(Color::White)),
        FetchState::Failed(reason) => Span::styled(format!("failed: {}", reason), Style::default().fg(Color::Red)),
        other => Span::styled(other.label().to_string(), Style::default().fg(Color::DarkGray)),
    }
}

fn draw_overview(f: &mut Frame, area: Rect, state: &UIState, session: &Session) {
    let input_line = if state.editing {
        Line::from(vec![
            label("Address"),
            Span::styled(format!("{}▏", state.input_buffer), Style::default().fg(Color::Yellow)),
        ])
    } else {
        Line::from(vec![label("Address"), Span::raw(session.input().to_string())])
    };

    let watched = session
        .watched()
        .map(|a| a.to_checksum(None))
        .unwrap_or_else(|| "none - connect a wallet or enter an address".to_string());

    let chain = session
        .chain_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());

    let lines = vec![
        input_line,
        Line::from(vec![label("Watching"), Span::raw(watched)]),
        Line::from(""),
        Line::from(vec![label("Chain ID"), Span::raw(chain)]),
        Line::from(vec![
            label("Balance"),
            slot_span(&session.balance, |wei| format!("{} ETH", commify(&format_ether(*wei)))),
        ]),
    ];

    let paragraph = Paragraph::new(lines).block(Block::default().title("Address").borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn money(value: alloy_primitives::U256, vault: &VaultInfo) -> String {
    format!("${}", commify(&format_units(value, vault.decimals)))
}

fn draw_vault(f: &mut Frame, area: Rect, session: &Session, config: &Config) {
    let vault = match &session.vault {
        FetchState::Ready(vault) => vault,
        other => {
            let paragraph = Paragraph::new(Line::from(vec![label("Vault"), slot_span(other, |_: &VaultInfo| String::new())]))
                .block(Block::default().title("Vault").borders(Borders::ALL));
            f.render_widget(paragraph, area);
            return;
        }
    };

    let mut lines = vec![
        Line::from(vec![
            label("Vault"),
            Span::styled(vault.name.clone(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![
            label("Explorer"),
            Span::raw(config.address_url(&vault.vault_address.to_checksum(None))),
        ]),
        Line::from(vec![label("Share price"), Span::raw(money(vault.share_price, vault))]),
        Line::from(""),
    ];

    match &session.position {
        FetchState::Ready(position) => lines.extend(summary_lines(position, vault)),
        FetchState::Empty => lines.push(Line::from(vec![label("Position"), Span::raw("no deposits found")])),
        other => lines.push(Line::from(vec![label("Position"), slot_span(other, |_: &Position| String::new())])),
    }

    let paragraph = Paragraph::new(lines).block(Block::default().title("Vault Performance").borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn summary_lines(position: &Position, vault: &VaultInfo) -> Vec<Line<'static>> {
    let s = &position.summary;
    let return_color = if s.net_return.is_negative() { Color::Red } else { Color::Green };
    let pct = s
        .return_pct()
        .map(|p| format!(" ({}%)", p))
        .unwrap_or_default();

    let mut lines = vec![
        Line::from(vec![label("Total invested"), Span::raw(money(s.total_invested, vault))]),
        Line::from(vec![
            label("Total shares"),
            Span::raw(commify(&format_units(s.total_shares, vault.decimals))),
        ]),
        Line::from(vec![label("Current value"), Span::raw(money(s.current_value, vault))]),
        Line::from(vec![
            label("Net return"),
            Span::styled(
                format!("${}{}", commify(&format_signed_units(s.net_return, vault.decimals)), pct),
                Style::default().fg(return_color).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(vec![label("As of block"), Span::raw(position.latest_block.to_string())]),
    ];
    if position.skipped > 0 {
        lines.push(Line::from(Span::styled(
            format!("{} share transfer(s) without a matching deposit were left out", position.skipped),
            Style::default().fg(Color::Yellow),
        )));
    }
    lines
}

fn draw_deposits(f: &mut Frame, area: Rect, state: &UIState, session: &Session, config: &Config) {
    let block = Block::default().title("Deposits").borders(Borders::ALL);

    let (position, vault) = match (&session.position, &session.vault) {
        (FetchState::Ready(position), FetchState::Ready(vault)) => (position, vault),
        (FetchState::Empty, _) => {
            f.render_widget(Paragraph::new("No deposits found for this address").block(block), area);
            return;
        }
        (other, _) => {
            let line = Line::from(vec![label("Deposits"), slot_span(other, |_: &Position| String::new())]);
            f.render_widget(Paragraph::new(line).block(block), area);
            return;
        }
    };

    let header = Row::new(vec!["Tx", "Block", "Amount", "Shares", "Price"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = position
        .records
        .iter()
        .skip(state.scroll_offset)
        .map(|r| {
            let tx = hex::encode_prefixed(r.tx_hash);
            Row::new(vec![
                Cell::from(truncate(&tx, 20, 0, 20)).style(Style::default().fg(Color::Cyan)),
                Cell::from(r.block_number.to_string()),
                Cell::from(money(r.token_amount, vault)),
                Cell::from(format_units(r.share_amount, vault.decimals)),
                Cell::from(money(r.price, vault)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(24),
        Constraint::Length(10),
        Constraint::Min(14),
        Constraint::Min(14),
        Constraint::Min(10),
    ];

    let title = match position.records.get(state.scroll_offset) {
        Some(top) => format!(
            "Deposits ({}) - {}",
            position.records.len(),
            config.tx_url(&hex::encode_prefixed(top.tx_hash))
        ),
        None => format!("Deposits ({})", position.records.len()),
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(table, area);
}

fn draw_alerts(f: &mut Frame, area: Rect, state: &UIState, alerts: &[Alert]) {
    let items: Vec<ListItem> = alerts
        .iter()
        .rev()
        .skip(state.scroll_offset)
        .map(|alert| {
            let color = match alert.level {
                AlertLevel::Info => Color::Cyan,
                AlertLevel::Warning => Color::Yellow,
                AlertLevel::Critical => Color::Red,
            };
            ListItem::new(Line::from(vec![
                Span::styled(alert.timestamp.format("%H:%M:%S ").to_string(), Style::default().fg(Color::DarkGray)),
                Span::styled(format!("{:<14}", alert.topic), Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(alert.message.clone()),
            ]))
        })
        .collect();

    let list = List::new(items).block(Block::default().title(format!("Alerts ({})", alerts.len())).borders(Borders::ALL));
    f.render_widget(list, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn tabs_wrap_and_reset_scroll() {
        let mut state = UIState::new();
        state.scroll_down();
        state.next_tab();
        assert_eq!(state.selected_tab, 1);
        assert_eq!(state.scroll_offset, 0);
        for _ in 0..3 {
            state.next_tab();
        }
        assert_eq!(state.selected_tab, 0);
        state.scroll_up();
        assert_eq!(state.scroll_offset, 0);
    }

    #[test]
    fn renders_every_tab_without_data() {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        let session = Session::default();
        let config = Config::default();
        let mut state = UIState::new();

        for _ in 0..TAB_TITLES.len() {
            terminal.draw(|f| draw(f, &state, &session, &[], &config)).unwrap();
            state.next_tab();
        }
    }

    #[tokio::test]
    async fn renders_demo_position() {
        use crate::api::fixture::StaticGateway;
        use crate::refresh::{run_cycle, CycleContext};
        use tokio::sync::RwLock;

        let config = Config::default();
        let ctx = CycleContext::from_config(&config).unwrap();
        let session = RwLock::new(Session::default());
        run_cycle(&StaticGateway::demo(ctx.vault_address), &session, &ctx).await;
        let session = session.into_inner();

        let mut terminal = Terminal::new(TestBackend::new(140, 30)).unwrap();
        let mut state = UIState::new();
        state.next_tab();
        terminal.draw(|f| draw(f, &state, &session, &[], &config)).unwrap();

        let screen: String = terminal.backend().buffer().content.iter().map(|c| c.symbol()).collect();
        assert!(screen.contains("USDC yVault"));
        assert!(screen.contains("$17,500.0"));
    }
}
