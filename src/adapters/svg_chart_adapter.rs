//! SVG candlestick charts with strategy overlays.

use crate::domain::error::CandlebotError;
use crate::domain::market::Market;
use crate::domain::output::Operation;
use crate::domain::symbol::Symbol;
use crate::ports::chart_port::ChartPort;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const WIDTH: f64 = 1200.0;
const HEIGHT: f64 = 500.0;
const PADDING: f64 = 40.0;

pub struct SvgChartAdapter;

impl SvgChartAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SvgChartAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// `<stem>_<BASE>_<QUOTE>.svg`
pub fn chart_path(stem: &Path, symbol: &Symbol) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(format!("_{}.svg", symbol.file_stem()));
    PathBuf::from(name)
}

fn placeholder(message: &str) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}"><text x="{:.0}" y="{:.0}" text-anchor="middle">{}</text></svg>
"#,
        WIDTH,
        HEIGHT,
        WIDTH / 2.0,
        HEIGHT / 2.0,
        message
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One panel for `symbol`: candles, plot polylines, trade and log markers.
pub fn render_symbol(market: &Market, symbol: &Symbol) -> String {
    let candles: Vec<(usize, _)> = market
        .frames()
        .enumerate()
        .filter_map(|(i, f)| f.ohlcv.get(symbol).map(|c| (i, *c)))
        .collect();
    if candles.is_empty() {
        return placeholder(&format!("No data for {}", escape(&symbol.to_string())));
    }

    // Overlay series keyed by label; x is the frame index.
    let mut series: BTreeMap<&str, (String, Vec<(usize, f64)>)> = BTreeMap::new();
    for (i, entry) in market.entries().iter().enumerate() {
        let Some(output) = &entry.output else { continue };
        for plot in &output.function_plots {
            if plot.symbol.as_ref().is_some_and(|s| s != symbol) {
                continue;
            }
            series
                .entry(plot.label.as_str())
                .or_insert_with(|| (plot.color.to_string(), Vec::new()))
                .1
                .push((i, plot.value));
        }
    }

    let mut min_price = candles.iter().map(|(_, c)| c.low).fold(f64::INFINITY, f64::min);
    let mut max_price = candles
        .iter()
        .map(|(_, c)| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    for (_, points) in series.values() {
        for (_, v) in points {
            min_price = min_price.min(*v);
            max_price = max_price.max(*v);
        }
    }

    let plot_width = WIDTH - 2.0 * PADDING;
    let plot_height = HEIGHT - 2.0 * PADDING;
    let range = max_price - min_price;
    let scale_y = if range > 0.0 { plot_height / range } else { 1.0 };
    let scale_x = if market.len() > 1 {
        plot_width / (market.len() - 1) as f64
    } else {
        0.0
    };
    let x = |i: usize| PADDING + i as f64 * scale_x;
    let y = |price: f64| HEIGHT - PADDING - (price - min_price) * scale_y;
    let body_width = (scale_x * 0.6).max(1.0);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}">
<rect width="100%" height="100%" fill="white"/>
<text x="{:.0}" y="{:.0}">{}</text>
<line x1="{:.0}" y1="{:.0}" x2="{:.0}" y2="{:.0}" stroke="black"/>
<line x1="{:.0}" y1="{:.0}" x2="{:.0}" y2="{:.0}" stroke="black"/>
"#,
        WIDTH,
        HEIGHT,
        WIDTH,
        HEIGHT,
        PADDING,
        PADDING / 2.0,
        escape(&symbol.to_string()),
        PADDING,
        PADDING,
        PADDING,
        HEIGHT - PADDING,
        PADDING,
        HEIGHT - PADDING,
        WIDTH - PADDING,
        HEIGHT - PADDING,
    );

    for (i, c) in &candles {
        let color = if c.is_bullish() { "green" } else { "red" };
        let top = y(c.open.max(c.close));
        let bottom = y(c.open.min(c.close));
        svg.push_str(&format!(
            r#"<line class="wick" x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}"/>
<rect class="candle" x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>
"#,
            x(*i),
            y(c.high),
            x(*i),
            y(c.low),
            color,
            x(*i) - body_width / 2.0,
            top,
            body_width,
            (bottom - top).max(0.5),
            color
        ));
    }

    for (label, (color, points)) in &series {
        let points: Vec<String> = points
            .iter()
            .map(|(i, v)| format!("{:.1},{:.1}", x(*i), y(*v)))
            .collect();
        svg.push_str(&format!(
            r#"<polyline fill="none" stroke="{}" stroke-width="1.5" points="{}"><title>{}</title></polyline>
"#,
            color,
            points.join(" "),
            escape(label)
        ));
    }

    for (i, entry) in market.entries().iter().enumerate() {
        let Some(output) = &entry.output else { continue };
        for t in output.transactions.iter().filter(|t| &t.symbol == symbol) {
            let color = match t.operation {
                Operation::Buy => "green",
                Operation::Sell => "red",
                Operation::Skip => "grey",
            };
            svg.push_str(&format!(
                r#"<line class="marker" x1="{:.1}" y1="{:.0}" x2="{:.1}" y2="{:.0}" stroke="{}"><title>{}</title></line>
"#,
                x(i),
                PADDING,
                x(i),
                HEIGHT - PADDING,
                color,
                escape(t.notes.as_deref().unwrap_or(&t.operation.to_string()))
            ));
        }
        for log in output
            .logs
            .iter()
            .filter(|l| l.symbol.as_ref().is_none_or(|s| s == symbol))
        {
            svg.push_str(&format!(
                r#"<line class="log" x1="{:.1}" y1="{:.0}" x2="{:.1}" y2="{:.0}" stroke="grey" stroke-dasharray="4 4"><title>{}</title></line>
"#,
                x(i),
                PADDING,
                x(i),
                HEIGHT - PADDING,
                escape(&log.value)
            ));
        }
    }

    svg.push_str("</svg>\n");
    svg
}

impl ChartPort for SvgChartAdapter {
    fn render(&self, market: &Market, stem: &Path) -> Result<Vec<PathBuf>, CandlebotError> {
        if let Some(parent) = stem.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let symbols: BTreeSet<&Symbol> = market.frames().flat_map(|f| f.symbols()).collect();
        if symbols.is_empty() {
            let mut name = stem.as_os_str().to_owned();
            name.push(".svg");
            let path = PathBuf::from(name);
            fs::write(&path, placeholder("No market data available."))?;
            return Ok(vec![path]);
        }

        let mut written = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let path = chart_path(stem, symbol);
            fs::write(&path, render_symbol(market, symbol))?;
            info!(path = %path.display(), "wrote chart");
            written.push(path);
        }
        Ok(written)
    }
}
