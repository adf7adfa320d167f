use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, error, info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, sync::Arc, time::Duration};
use tokio::sync::{mpsc, RwLock};

mod alert;
mod api;
mod config;
mod error;
mod model;
mod position;
mod refresh;
mod report;
mod session;
mod ui;

use api::fixture::StaticGateway;
use api::provider::ChainGateway;
use api::rpc::EthereumProvider;
use config::{Config, OperatingMode};
use model::address::parse_address;
use model::Alert;
use session::Session;
use ui::ui::UIState;

#[derive(Parser)]
#[command(name = "yearn-stats")]
#[command(about = "Terminal dashboard for a Yearn vault position")]
struct Args {
    #[arg(long)]
    generate_config: bool,

    #[arg(short, long)]
    config: Option<String>,

    /// Address to watch instead of the wallet's first account.
    #[arg(long)]
    address: Option<String>,

    /// Run one fetch cycle, print the result and exit.
    #[arg(long)]
    report: bool,

    /// Print the report as JSON.
    #[arg(long, requires = "report")]
    json: bool,

    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug || args.report {
        let level = if args.debug { log::LevelFilter::Debug } else { log::LevelFilter::Warn };
        env_logger::Builder::from_default_env().filter_level(level).init();
    } else {
        tui_logger::init_logger(log::LevelFilter::Debug)?;
        tui_logger::set_default_level(log::LevelFilter::Debug);
    }

    if args.generate_config {
        config::generate_sample_config()?;
        println!("✅ Sample configuration generated at config.toml");
        return Ok(());
    }

    let mut config = config::load_config(args.config.as_deref())?;

    if let Some(address) = &args.address {
        parse_address(address).with_context(|| format!("--address {}", address))?;
        config.watched_address = Some(address.clone());
    }

    if !args.report {
        print_startup_banner();
    }

    match config.operating_mode {
        OperatingMode::Live => {
            info!("🚀 Starting live mode against {}", config.rpc_url);
            let provider = EthereumProvider::new(&config)?;
            run(provider, config, &args).await
        }
        OperatingMode::Demo => {
            info!("🧪 Starting demo mode");
            let vault = parse_address(&config.vault_address)?;
            run(StaticGateway::demo(vault), config, &args).await
        }
    }
}

pub fn print_startup_banner() {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                         YEARN STATS                          ║");
    println!("║                                                              ║");
    println!("║        Deposits, shares and returns of a Yearn vault         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

async fn run<G: ChainGateway + 'static>(gateway: G, config: Config, args: &Args) -> Result<()> {
    if args.report {
        run_report(gateway, config, args.json).await
    } else {
        let debug_mode = args.debug || config.ui_settings.show_debug_info;
        run_dashboard(gateway, config, debug_mode).await
    }
}

fn initial_session(config: &Config) -> Result<Session> {
    let watched = config.watched_address.as_deref().map(parse_address).transpose()?;
    Ok(Session::new(watched))
}

async fn run_report<G: ChainGateway>(gateway: G, config: Config, json: bool) -> Result<()> {
    let ctx = refresh::CycleContext::from_config(&config)?;
    let session = RwLock::new(initial_session(&config)?);

    refresh::run_cycle(&gateway, &session, &ctx).await;
    let session = session.into_inner();

    if json {
        println!("{}", serde_json::to_string_pretty(&report::Report::from(&session))?);
    } else {
        print!("{}", report::render_text(&session, &config));
    }
    Ok(())
}

async fn run_dashboard<G: ChainGateway + 'static>(gateway: G, config: Config, debug_mode: bool) -> Result<()> {
    let gateway = Arc::new(gateway);
    let session = Arc::new(RwLock::new(initial_session(&config)?));
    let alerts = Arc::new(RwLock::new(Vec::<Alert>::new()));
    let (refresh_tx, refresh_rx) = mpsc::channel(8);

    let loop_handle = tokio::spawn(refresh::refresh_loop(
        gateway,
        session.clone(),
        alerts.clone(),
        config.clone(),
        refresh_rx,
    ));

    let result = run_ui(session, alerts, config, refresh_tx, debug_mode).await;
    loop_handle.abort();
    result
}

async fn run_ui(
    session: Arc<RwLock<Session>>,
    alerts: Arc<RwLock<Vec<Alert>>>,
    config: Config,
    refresh_tx: mpsc::Sender<()>,
    debug_mode: bool,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = ui_loop(&mut terminal, &session, &alerts, &config, &refresh_tx, debug_mode).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn request_refresh(refresh_tx: &mpsc::Sender<()>) {
    if refresh_tx.try_send(()).is_err() {
        debug!("🔄 Refresh already queued");
    }
}

async fn ui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &RwLock<Session>,
    alerts: &RwLock<Vec<Alert>>,
    config: &Config,
    refresh_tx: &mpsc::Sender<()>,
    debug_mode: bool,
) -> Result<()> {
    let mut ui_state = UIState::new();
    let mut last_seen_alert: Option<String> = None;
    let mut update_counter: u64 = 0;

    show_loading_screen(terminal, config)?;
    tokio::time::sleep(Duration::from_millis(800)).await;

    info!("🎨 Starting UI loop (debug: {})", debug_mode);

    loop {
        update_counter += 1;

        let session_snapshot = session.read().await.clone();
        let alerts_snapshot = alerts.read().await.clone();

        if debug_mode && update_counter % 100 == 0 {
            debug!(
                "📊 UI update #{} - generation {}, balance {}, position {}",
                update_counter,
                session_snapshot.generation(),
                session_snapshot.balance.label(),
                session_snapshot.position.label()
            );
        }

        log_new_critical_alerts(&alerts_snapshot, &mut last_seen_alert);

        terminal.draw(|f| ui::ui::draw(f, &ui_state, &session_snapshot, &alerts_snapshot, config))?;

        if !event::poll(Duration::from_millis(config.ui_settings.refresh_rate_ms))? {
            continue;
        }
        let key = match event::read()? {
            Event::Key(key) => key,
            _ => continue,
        };

        if ui_state.editing {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => {
                    ui_state.editing = false;
                    ui_state.input_buffer = session.read().await.input().to_string();
                }
                KeyCode::Char(c) => {
                    ui_state.input_buffer.push(c);
                    apply_input(session, &ui_state.input_buffer, refresh_tx).await;
                }
                KeyCode::Backspace => {
                    ui_state.input_buffer.pop();
                    apply_input(session, &ui_state.input_buffer, refresh_tx).await;
                }
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                if key.modifiers.contains(KeyModifiers::CONTROL) || key.modifiers.is_empty() {
                    info!("👋 User requested quit");
                    break;
                }
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                info!("👋 Interrupted");
                break;
            }
            KeyCode::Esc => {
                info!("👋 User pressed escape");
                break;
            }
            KeyCode::Tab => {
                ui_state.next_tab();
                debug!("📑 Switched to next tab");
            }
            KeyCode::Up => ui_state.scroll_up(),
            KeyCode::Down => ui_state.scroll_down(),
            KeyCode::PageUp => {
                for _ in 0..10 {
                    ui_state.scroll_up();
                }
            }
            KeyCode::PageDown => {
                for _ in 0..10 {
                    ui_state.scroll_down();
                }
            }
            KeyCode::Home => ui_state.scroll_offset = 0,
            KeyCode::Char('a') | KeyCode::Char('A') => {
                ui_state.start_editing(session_snapshot.input());
            }
            KeyCode::Char('r') | KeyCode::Char('R') | KeyCode::F(5) => {
                info!("🔄 User requested refresh");
                request_refresh(refresh_tx);
            }
            KeyCode::Char('h') | KeyCode::Char('H') => {
                info!("❓ Showing help screen");
                show_help_screen(terminal, config, debug_mode)?;
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                info!("💾 Saving configuration");
                let mut to_save = config.clone();
                to_save.watched_address = session_snapshot.watched().map(|a| a.to_checksum(None));
                if let Err(e) = config::save_config_to_file(&to_save, "config.toml") {
                    error!("❌ Failed to save configuration: {}", e);
                } else {
                    info!("✅ Configuration saved to config.toml");
                }
            }
            _ => {}
        }
    }

    Ok(())
}

async fn apply_input(session: &RwLock<Session>, text: &str, refresh_tx: &mpsc::Sender<()>) {
    match session.write().await.set_input(text) {
        Ok(true) => request_refresh(refresh_tx),
        Ok(false) => {}
        Err(e) => debug!("✏️ {}", e),
    }
}

fn show_loading_screen(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, config: &Config) -> Result<()> {
    use ratatui::{
        layout::{Alignment, Constraint, Direction, Layout},
        style::{Color, Modifier, Style},
        text::{Line, Span},
        widgets::{Block, Borders, Paragraph},
    };

    terminal.draw(|f| {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(30),
                Constraint::Length(10),
                Constraint::Percentage(60),
            ])
            .split(f.size());

        let title = Paragraph::new(vec![
            Line::from(""),
            Line::from(vec![Span::styled(
                "YEARN STATS",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(vec![Span::styled(
                "Deposits, shares and returns of a Yearn vault",
                Style::default().fg(Color::White),
            )]),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));

        let (mode_text, mode_color) = match config.operating_mode {
            OperatingMode::Live => ("LIVE - JSON-RPC", Color::Green),
            OperatingMode::Demo => ("DEMO - Fixture chain", Color::Yellow),
        };
        let watched = config.watched_address.clone().unwrap_or_else(|| "wallet account".to_string());

        let loading = Paragraph::new(vec![
            Line::from(vec![Span::styled(
                mode_text,
                Style::default().fg(mode_color).add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(vec![
                Span::raw("RPC Endpoint: "),
                Span::styled(config.rpc_url.clone(), Style::default().fg(Color::Cyan)),
            ]),
            Line::from(vec![
                Span::raw("Vault: "),
                Span::styled(config.vault_address.clone(), Style::default().fg(Color::Yellow)),
            ]),
            Line::from(vec![
                Span::raw("Watching: "),
                Span::styled(watched, Style::default().fg(Color::Yellow)),
            ]),
            Line::from(vec![
                Span::raw("Update Interval: "),
                Span::styled(format!("{}ms", config.update_interval_ms), Style::default().fg(Color::Green)),
            ]),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().title("Initializing").borders(Borders::ALL));

        f.render_widget(title, chunks[0]);
        f.render_widget(loading, chunks[1]);
    })?;

    Ok(())
}

fn show_help_screen(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &Config,
    debug_mode: bool,
) -> Result<()> {
    use ratatui::{
        layout::{Alignment, Constraint, Direction, Layout},
        style::{Color, Modifier, Style},
        text::{Line, Span},
        widgets::{Block, Borders, Paragraph},
    };

    let section = |name: &'static str| {
        Line::from(vec![Span::styled(
            name,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )])
    };

    terminal.draw(|f| {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
            .split(f.size());

        let mode = match config.operating_mode {
            OperatingMode::Live => "LIVE",
            OperatingMode::Demo => "DEMO",
        };
        let title = Paragraph::new(format!("Help - Yearn Stats ({})", mode))
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));

        let help_text = Paragraph::new(vec![
            section("NAVIGATION"),
            Line::from("Tab                 - Switch between tabs"),
            Line::from("↑/↓ Arrow Keys      - Scroll content"),
            Line::from("Page Up/Page Down   - Fast scroll"),
            Line::from("Home                - Jump to top"),
            Line::from(""),
            section("CONTROLS"),
            Line::from("A                   - Edit watched address"),
            Line::from("R or F5             - Refresh now"),
            Line::from("H                   - Show this help"),
            Line::from("S                   - Save configuration"),
            Line::from("Q, Esc or Ctrl+C    - Quit application"),
            Line::from(""),
            section("CURRENT SESSION"),
            Line::from(format!("Mode: {}", mode)),
            Line::from(format!("Debug: {}", if debug_mode { "ENABLED" } else { "DISABLED" })),
            Line::from(format!("Explorer: {}", config.explorer_url)),
            Line::from(""),
            section("TABS"),
            Line::from("Overview            - Address, network and ETH balance"),
            Line::from("Vault               - Share price and position summary"),
            Line::from("Deposits            - Every deposit with its entry price"),
            Line::from("Alerts              - Share price drops, losses and fetch failures"),
            Line::from(""),
            Line::from("Press any key to return to dashboard..."),
        ])
        .block(Block::default().borders(Borders::ALL));

        let footer = Paragraph::new("Amounts are shown in the vault's underlying token")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));

        f.render_widget(title, chunks[0]);
        f.render_widget(help_text, chunks[1]);
        f.render_widget(footer, chunks[2]);
    })?;

    loop {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(_) = event::read()? {
                break;
            }
        }
    }

    Ok(())
}

fn log_new_critical_alerts(alerts: &[Alert], last_seen: &mut Option<String>) {
    let fresh = alert::unseen_critical(alerts, last_seen.as_deref());
    if !fresh.is_empty() {
        warn!("🔴 {} new critical alert(s) detected!", fresh.len());
        for alert in fresh {
            error!("CRITICAL: {} - {}", alert.topic, alert.message);
        }
    }
    if let Some(newest) = alerts.last() {
        *last_seen = Some(newest.id.clone());
    }
}
