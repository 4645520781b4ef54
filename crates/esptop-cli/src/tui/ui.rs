//! TUI rendering: btop-style layout.
//!
//! ┏━ ESP32 Monitor ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┓
//! ┃ A:alltasks S:stop Q:quit │ AllTasks:OFF │ ● RUNNING │ up 00:01:02     ┃
//! ┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┛
//! ╭ CPU: 240MHz ─────────────────────╮╭ Tasks (3/12) ─────────────────────╮
//! │ CPU ████████░░░░  42%            ││ Pid  Program  Command  Threads …  │
//! │ C0  …                            ││ …                                 │
//! │ ▂▃▅▇█▆▄                          ││                                   │
//! ╰──────────────────────────────────╯│                                   │
//! ╭ Memory ────────╮╭ Network ───────╮│                                   │
//! │ Total / Used   ││ ▼ / ▲ graphs   ││                                   │
//! ╰────────────────╯╰────────────────╯╰───────────────────────────────────╯
//!  Port /dev/ttyUSB0 │ 115200 baud │ 1.23 KB/s │ 42 records │ 0 errors

use esptop_core::panels::{CpuPanel, MemoryPanel, NetworkPanel, TaskPanel};
use esptop_core::{Band, Bar, DashboardView, FooterPanel, Graph, HeaderPanel, PanelView, Phase};
use ratatui::{prelude::*, widgets::*};

const CPU_HEIGHT: u16 = 14;

pub fn draw(f: &mut Frame, view: &DashboardView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(10),   // panels
            Constraint::Length(1), // footer
        ])
        .split(f.area());

    draw_header(f, rows[0], &view.header);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(CPU_HEIGHT), Constraint::Min(6)])
        .split(cols[0]);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(left[1]);

    draw_cpu(f, left[0], &view.cpu);
    draw_memory(f, bottom[0], &view.memory);
    draw_network(f, bottom[1], &view.network);
    draw_tasks(f, cols[1], &view.tasks);
    draw_footer(f, rows[2], &view.footer);
}

// ---------------------------------------------------------------------------
// Header / footer
// ---------------------------------------------------------------------------

fn draw_header(f: &mut Frame, area: Rect, header: &HeaderPanel) {
    let dim = Style::default().fg(Color::DarkGray);
    let mut spans = vec![Span::raw(" ")];
    for hint in header.keys {
        spans.push(Span::styled(hint.key, Style::default().bold().fg(Color::Yellow)));
        spans.push(Span::raw(format!(":{} ", hint.action)));
    }
    spans.push(Span::styled("│ ", dim));
    spans.push(Span::raw("AllTasks:"));
    spans.push(if header.show_all_tasks {
        Span::styled("ON", Style::default().bold().fg(Color::Green))
    } else {
        Span::styled("OFF", dim)
    });
    spans.push(Span::styled(" │ ", dim));
    let phase_color = phase_color(header.phase);
    spans.push(Span::styled(
        format!("● {}", header.phase),
        Style::default().bold().fg(phase_color),
    ));
    spans.push(Span::styled(" │ ", dim));
    spans.push(Span::raw(format!("up {}", header.elapsed)));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Thick)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            format!(" {} ", header.title),
            Style::default().bold().fg(Color::Cyan),
        ));

    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_footer(f: &mut Frame, area: Rect, footer: &FooterPanel) {
    let dim = Style::default().fg(Color::DarkGray);
    let errors = footer.parse_errors + footer.read_errors;
    let mut spans = vec![
        Span::styled(format!(" {} ", footer.port), dim),
        Span::styled(format!("│ {} baud ", footer.baud), dim),
        Span::styled(format!("│ {:.2} KB/s ", footer.rate), dim),
        Span::styled(format!("│ {} records ", footer.records), dim),
        Span::styled(
            format!(
                "│ {errors} errors ({} parse, {} read) ",
                footer.parse_errors, footer.read_errors
            ),
            if errors > 0 {
                Style::default().fg(Color::Yellow)
            } else {
                dim
            },
        ),
    ];
    if footer.reconnects > 0 {
        spans.push(Span::styled(format!("│ {} reconnects ", footer.reconnects), dim));
    }
    if footer.stale {
        spans.push(Span::styled("│ STALE", Style::default().bold().fg(Color::Red)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ---------------------------------------------------------------------------
// Data panels
// ---------------------------------------------------------------------------

fn draw_cpu(f: &mut Frame, area: Rect, panel: &PanelView<CpuPanel>) {
    let title = match panel.ready() {
        Some(cpu) => format!(" CPU: {:.0}MHz / {:.0}MHz ", cpu.mhz, cpu.max_mhz),
        None => " CPU ".to_string(),
    };
    let block = panel_block(title, Color::Green);
    let Some(cpu) = unwrap_panel(f, area, block.clone(), panel, "⏸ PAUSED - Press S to resume")
    else {
        return;
    };

    let mut lines = vec![
        bar_line("CPU ", &cpu.total, Color::Green),
        bar_line("C0  ", &cpu.cores[0], Color::Cyan),
        bar_line("C1  ", &cpu.cores[1], Color::Cyan),
        Line::raw(""),
    ];
    let inner = block.inner(area);
    lines.extend(graph_lines(&cpu.graph, inner.width, Color::Green));
    lines.push(Line::raw(""));
    lines.push(Line::from(vec![
        Span::styled("Uptime: ", Style::default().fg(Color::DarkGray)),
        Span::raw(cpu.uptime.clone()),
    ]));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_memory(f: &mut Frame, area: Rect, panel: &PanelView<MemoryPanel>) {
    let block = panel_block(" Memory ".to_string(), Color::Magenta);
    let Some(mem) = unwrap_panel(f, area, block.clone(), panel, "⏸ PAUSED") else {
        return;
    };

    let band = band_color(mem.band);
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(vec![Span::styled("Total:     ", label), Span::raw(mem.total.clone())]),
        Line::from(vec![
            Span::styled("Used:      ", label),
            Span::styled(mem.used.clone(), Style::default().fg(band)),
        ]),
        bar_line("", &mem.used_bar, band),
        Line::from(vec![
            Span::styled("Available: ", label),
            Span::raw(format!("{} ({:.0}%)", mem.available, mem.available_percent)),
        ]),
        Line::from(vec![Span::styled("Min Free:  ", label), Span::raw(mem.min_free.clone())]),
        Line::styled("  watermark (lowest ever)", label),
    ];
    let inner = block.inner(area);
    lines.extend(graph_lines(&mem.graph, inner.width, band));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_network(f: &mut Frame, area: Rect, panel: &PanelView<NetworkPanel>) {
    let title = match panel.ready() {
        Some(net) => format!(" Network (RSSI {} dBm) ", net.rssi),
        None => " Network ".to_string(),
    };
    let block = panel_block(title, Color::Blue);
    let Some(net) = unwrap_panel(f, area, block.clone(), panel, "⏸ PAUSED") else {
        return;
    };

    let inner = block.inner(area);
    let mut lines = graph_lines(&net.download_graph, inner.width, Color::Cyan);
    lines.extend(throughput_lines("▼", &net.download, Color::Cyan));

    // Upload graph only when there is room for it below the download figures.
    let used = lines.len() + 3;
    if usize::from(inner.height) >= used + net.upload_graph.height() {
        lines.extend(graph_lines(&net.upload_graph, inner.width, Color::Red));
    }
    lines.extend(throughput_lines("▲", &net.upload, Color::Red));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_tasks(f: &mut Frame, area: Rect, panel: &PanelView<TaskPanel>) {
    let title = match panel.ready() {
        Some(t) => format!(" Tasks ({}/{}, device reports {}) ", t.matched, t.total, t.reported),
        None => " Tasks ".to_string(),
    };
    let block = panel_block(title, Color::Yellow);
    let Some(tasks) = unwrap_panel(f, area, block.clone(), panel, "⏸ PAUSED") else {
        return;
    };

    let header = Row::new(vec![
        Cell::from("Pid"),
        Cell::from("Program"),
        Cell::from("Command"),
        Cell::from(Line::from("Threads").right_aligned()),
        Cell::from("User"),
        Cell::from(Line::from("MemB").right_aligned()),
        Cell::from(Line::from("Cpu%").right_aligned()),
    ])
    .style(Style::default().bold().fg(Color::Yellow));

    let rows: Vec<Row> = tasks
        .rows
        .iter()
        .map(|t| {
            let cpu_style = Style::default().fg(band_color(Band::for_percent(t.cpu)));
            Row::new(vec![
                Cell::from(t.pid.to_string()),
                Cell::from(t.name.clone()),
                Cell::from(t.cmd.clone()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(Line::from(t.threads.to_string()).right_aligned()),
                Cell::from(t.user.clone()),
                Cell::from(Line::from(t.mem.clone()).right_aligned()),
                Cell::from(Line::from(format!("{:.1}", t.cpu)).right_aligned()).style(cpu_style),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),  // pid
            Constraint::Length(16), // program
            Constraint::Min(10),    // command
            Constraint::Length(7),  // threads
            Constraint::Length(8),  // user
            Constraint::Length(7),  // mem
            Constraint::Length(6),  // cpu
        ],
    )
    .header(header)
    .block(block);

    f.render_widget(table, area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn panel_block(title: String, color: Color) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
        .title(Span::styled(title, Style::default().bold().fg(color)))
}

/// Draw the placeholder for a panel without data; return the data otherwise.
fn unwrap_panel<'a, T>(
    f: &mut Frame,
    area: Rect,
    block: Block<'static>,
    panel: &'a PanelView<T>,
    paused_text: &str,
) -> Option<&'a T> {
    let (text, style) = match panel {
        PanelView::Ready(data) => return Some(data),
        PanelView::Waiting(msg) => (msg.to_string(), Style::default().fg(Color::DarkGray)),
        PanelView::Paused => (
            paused_text.to_string(),
            Style::default().bold().fg(Color::Yellow),
        ),
    };
    let placeholder = Paragraph::new(Line::styled(text, style))
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(placeholder, area);
    None
}

fn bar_line(label: &str, bar: &Bar, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(label.to_string(), Style::default().fg(Color::DarkGray)),
        Span::styled("█".repeat(bar.filled), Style::default().fg(color)),
        Span::styled("░".repeat(bar.empty()), Style::default().fg(Color::DarkGray)),
        Span::raw(format!(" {:>5.1}%", bar.percent)),
    ])
}

/// Graph rows, keeping the rightmost (newest) columns when the panel is narrower.
fn graph_lines(graph: &Graph, width: u16, color: Color) -> Vec<Line<'static>> {
    let width = usize::from(width);
    graph
        .lines()
        .into_iter()
        .map(|row| {
            let skip = row.chars().count().saturating_sub(width);
            let visible: String = row.chars().skip(skip).collect();
            Line::styled(visible, Style::default().fg(color))
        })
        .collect()
}

fn throughput_lines(
    arrow: &str,
    t: &esptop_core::Throughput,
    color: Color,
) -> Vec<Line<'static>> {
    let arrow_style = Style::default().bold().fg(color);
    let dim = Style::default().fg(Color::DarkGray);
    vec![
        Line::from(vec![
            Span::styled(format!("{arrow} "), arrow_style),
            Span::raw(format!("{:.2} KB/s", t.current)),
        ]),
        Line::from(vec![
            Span::styled(format!("{arrow} Top:   "), dim),
            Span::raw(format!("{:.2} KB/s", t.top)),
        ]),
        Line::from(vec![
            Span::styled(format!("{arrow} Total: "), dim),
            Span::raw(format!("{:.2} KB", t.total_kb)),
        ]),
    ]
}

fn band_color(band: Band) -> Color {
    match band {
        Band::Normal => Color::Green,
        Band::Warning => Color::Yellow,
        Band::Critical => Color::Red,
    }
}

fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Running => Color::Green,
        Phase::Paused => Color::Red,
        Phase::Connecting | Phase::Disconnected => Color::Yellow,
        Phase::ShuttingDown => Color::DarkGray,
    }
}
