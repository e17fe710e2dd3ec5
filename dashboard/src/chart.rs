//! Chart datasets for sensor, thing, status and usage charts.

use crate::model::{DeviceStatus, Measurement, MeasurementValue};
use crate::paging::QueryParams;
use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Format of x-axis labels.
pub const LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Format of the `timeAt`/`endTimeAt` query parameters.
pub const WINDOW_FORMAT: &str = "%Y-%m-%dT%H:%M";

const DOOR_STATE: &str = "10351/50";
const PUMPING_DURATION: &str = "3350/5544";
const PUMPING_STATE: &str = "3350/5850";

/// A time series sample that can be plotted.
pub trait ChartPoint {
    fn timestamp(&self) -> DateTime<Utc>;
    fn unit(&self) -> &str;
    fn numeric(&self) -> Option<f64>;
    fn count(&self) -> Option<f64>;
    fn flag(&self) -> Option<bool>;
}

impl ChartPoint for Measurement {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn unit(&self) -> &str {
        &self.unit
    }

    fn numeric(&self) -> Option<f64> {
        self.value
    }

    fn count(&self) -> Option<f64> {
        self.count
    }

    fn flag(&self) -> Option<bool> {
        self.bool_value
    }
}

impl ChartPoint for MeasurementValue {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn unit(&self) -> &str {
        &self.unit
    }

    fn numeric(&self) -> Option<f64> {
        self.value
    }

    fn count(&self) -> Option<f64> {
        self.count
    }

    fn flag(&self) -> Option<bool> {
        self.bool_value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<(String, f64)>,
}

impl ChartDataset {
    pub fn new(label: impl Into<String>) -> Self {
        ChartDataset {
            label: label.into(),
            data: Vec::new(),
        }
    }

    pub fn push(&mut self, x: impl Into<String>, y: f64) {
        self.data.push((x.into(), y));
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Builds one dataset from time ordered points.
///
/// Boolean samples are drawn as a step function: a change of level emits the
/// old level and the new level at the same timestamp, repeated levels emit nothing.
pub fn to_dataset<P: ChartPoint>(label: &str, points: &[P]) -> ChartDataset {
    let mut dataset = ChartDataset::new(label);
    let mut previous = 0.0;

    for point in points {
        if dataset.label.is_empty() {
            dataset.label = point.unit().to_string();
        }

        let ts = point.timestamp().format(LABEL_FORMAT).to_string();

        if let Some(v) = point.numeric() {
            dataset.push(ts, v);
            continue;
        }

        if let Some(count) = point.count().filter(|c| *c > 0.0) {
            dataset.push(ts.clone(), count);
        }

        if let Some(flag) = point.flag() {
            let level = if flag { 1.0 } else { 0.0 };
            if level != previous {
                dataset.push(ts.clone(), previous);
                dataset.push(ts, level);
                previous = level;
            }
        }
    }

    dataset
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChartPresentation {
    pub kind: ChartKind,
    pub step: Option<u32>,
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl ChartPresentation {
    fn line() -> Self {
        ChartPresentation {
            kind: ChartKind::Line,
            step: None,
            min: None,
            max: None,
        }
    }

    fn stepped_line() -> Self {
        ChartPresentation {
            step: Some(1),
            ..Self::line()
        }
    }

    fn bar() -> Self {
        ChartPresentation {
            kind: ChartKind::Bar,
            step: Some(1),
            min: Some(0),
            max: None,
        }
    }
}

/// Chart routing for one tab of a thing, keyed by lowercase `type[:subtype]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThingChart {
    pub thing_type: String,
    pub tab: String,
    /// Series name sent upstream, the tab with `-` turned into `/`.
    pub series: String,
}

impl ThingChart {
    pub fn new(thing_type: &str, sub_type: &str, tab: &str) -> Self {
        let mut full_type = thing_type.to_lowercase();
        if !sub_type.is_empty() {
            full_type.push(':');
            full_type.push_str(&sub_type.to_lowercase());
        }

        let tab = tab.to_lowercase();
        ThingChart {
            thing_type: full_type,
            series: tab.replace('-', "/"),
            tab,
        }
    }

    fn is_container(&self) -> bool {
        matches!(
            self.thing_type.as_str(),
            "container" | "container:wastecontainer" | "container:sandstorage"
        )
    }

    /// Query sent to thing management for the chart window.
    pub fn query(&self, window: &TimeWindow) -> QueryParams {
        let mut q = QueryParams::new();
        q.add("timerel", "between");
        q.add("timeat", &window.start.to_rfc3339_opts(SecondsFormat::Secs, true));
        q.add("endTimeAt", &window.end.to_rfc3339_opts(SecondsFormat::Secs, true));
        q.add("options", "groupByRef");

        match self.thing_type.as_str() {
            "desk" => {
                q.add("n", &self.series);
                q.add("timeunit", "hour");
                q.add("vb", "true");
                q.remove("options");
            }
            "lifebuoy" => {
                q.add("n", &self.series);
                q.remove("options");
            }
            "passage" => {
                q.add("n", &self.series);
                if self.series == DOOR_STATE {
                    q.add("timeunit", "hour");
                    q.add("vb", "true");
                    q.remove("options");
                }
            }
            "pumpingstation" => {
                q.add("n", &self.series);
                if self.series == PUMPING_DURATION {
                    q.add("op", "gt");
                    q.add("value", "0");
                }
                if self.series == PUMPING_STATE {
                    q.add("timeunit", "hour");
                    q.add("vb", "true");
                }
                q.remove("options");
            }
            "pointofinterest" | "pointofinterest:beach" | "building" | "room" | "sewer"
            | "sewer:combinedseweroverflow" | "watermeter" => {
                q.add("n", &self.series);
            }
            _ if self.is_container() => {
                q.add("n", &self.series);
            }
            _ => {}
        }

        q
    }

    /// Dataset label. Empty means the first point's unit is used.
    pub fn label(&self) -> &str {
        match self.thing_type.as_str() {
            "desk" | "lifebuoy" | "pumpingstation" => "",
            _ => &self.tab,
        }
    }

    pub fn presentation(&self, max_distance: Option<f64>) -> ChartPresentation {
        match self.thing_type.as_str() {
            _ if self.is_container() => {
                let mut max = 100;
                if self.series.ends_with("/3") {
                    if let Some(maxd) = max_distance.filter(|d| *d > 0.0) {
                        max = maxd.ceil() as u32;
                    }
                }
                ChartPresentation {
                    kind: ChartKind::Line,
                    step: Some(10),
                    min: None,
                    max: Some(max),
                }
            }
            "desk" | "lifebuoy" | "room" => ChartPresentation::stepped_line(),
            "passage" if self.series == DOOR_STATE => ChartPresentation::bar(),
            "passage" => ChartPresentation::stepped_line(),
            "pumpingstation" => ChartPresentation::bar(),
            _ => ChartPresentation::line(),
        }
    }
}

/// Inclusive time range of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

impl TimeWindow {
    /// 00:00:00 to 23:59:59 UTC of the day `now` falls on.
    pub fn today(now: DateTime<Utc>) -> Self {
        let start = midnight(now.date_naive());
        TimeWindow {
            start,
            end: start + Duration::days(1) - Duration::seconds(1),
        }
    }

    pub fn last_day(now: DateTime<Utc>) -> Self {
        TimeWindow {
            start: now - Duration::hours(24),
            end: now,
        }
    }

    /// Three days back at midnight through the end of today.
    pub fn usage(now: DateTime<Utc>) -> Self {
        let today = Self::today(now);
        TimeWindow {
            start: today.start - Duration::days(3),
            end: today.end,
        }
    }

    /// Reads `timeAt` and `endTimeAt`, keeping the default for missing or malformed values.
    pub fn from_query(query: &QueryParams, default: TimeWindow) -> Self {
        TimeWindow {
            start: parse_time(query.get("timeAt")).unwrap_or(default.start),
            end: parse_time(query.get("endTimeAt")).unwrap_or(default.end),
        }
    }
}

pub fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    NaiveDateTime::parse_from_str(value, WINDOW_FORMAT)
        .ok()
        .map(|t| Utc.from_utc_datetime(&t))
}

pub fn days_in_month(ts: DateTime<Utc>) -> u32 {
    let (year, month) = if ts.month() == 12 {
        (ts.year() + 1, 1)
    } else {
        (ts.year(), ts.month() + 1)
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Daily sums grouped into one dataset per month, labelled by day of month.
pub fn usage_datasets(values: &[MeasurementValue]) -> Vec<ChartDataset> {
    let mut months: BTreeMap<String, ChartDataset> = BTreeMap::new();

    for v in values {
        let key = v.timestamp.format("%Y-%m").to_string();
        months
            .entry(key.clone())
            .or_insert_with(|| ChartDataset::new(key))
            .push(v.timestamp.day().to_string(), v.count.unwrap_or(0.0));
    }

    months.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPoint {
    pub x: String,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusDataset {
    pub label: String,
    pub data: Vec<StatusPoint>,
    #[serde(rename = "yAxisID")]
    pub y_axis_id: String,
}

impl StatusDataset {
    fn new(label: &str, axis: &str) -> Self {
        StatusDataset {
            label: label.to_string(),
            data: Vec::new(),
            y_axis_id: axis.to_string(),
        }
    }

    fn push(&mut self, at: Option<DateTime<Utc>>, y: f64) {
        let x = at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        self.data.push(StatusPoint { x, y });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleGrid {
    #[serde(rename = "drawOnChartArea")]
    pub draw_on_chart_area: bool,
    #[serde(rename = "drawTicks")]
    pub draw_ticks: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleTitle {
    pub display: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleTime {
    #[serde(rename = "tooltipFormat")]
    pub tooltip_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartScale {
    #[serde(rename = "type")]
    pub scale_type: String,
    pub grid: ScaleGrid,
    pub title: ScaleTitle,
    pub time: ScaleTime,
    pub position: String,
    #[serde(rename = "suggestedMin")]
    pub min: f64,
    #[serde(rename = "suggestedMax")]
    pub max: f64,
}

impl ChartScale {
    fn new(label: &str, position: &str, min: f64, max: f64) -> Self {
        ChartScale {
            scale_type: "linear".to_string(),
            grid: ScaleGrid {
                draw_on_chart_area: false,
                draw_ticks: false,
            },
            title: ScaleTitle {
                display: true,
                text: label.to_string(),
            },
            time: ScaleTime {
                tooltip_format: "DD T".to_string(),
            },
            position: position.to_string(),
            min,
            max,
        }
    }
}

/// Radio and battery history of a sensor, serialised for the browser chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChart {
    pub datasets: Vec<StatusDataset>,
    pub scales: BTreeMap<String, ChartScale>,
    pub time_at: String,
    pub end_time_at: String,
}

pub fn status_chart(statuses: &[DeviceStatus]) -> StatusChart {
    let mut dr = StatusDataset::new("DR", "yDR");
    let mut frequency = StatusDataset::new("Frequency (MHz)", "yFrequency");
    let mut snr = StatusDataset::new("SNR", "yLoRaSNR");
    let mut rssi = StatusDataset::new("RSSI", "yRSSI");
    let mut spreading_factor = StatusDataset::new("Spreading factor", "ySpreadingFactor");
    let mut battery = StatusDataset::new("Battery level", "yBatteryLevel");

    for s in statuses {
        if s.battery_level > 0 {
            battery.push(s.observed_at, s.battery_level as f64);
        }
        if let Some(v) = s.dr {
            dr.push(s.observed_at, v as f64);
        }
        if let Some(v) = s.frequency {
            frequency.push(s.observed_at, v as f64 / 1_000_000.0);
        }
        if let Some(v) = s.lora_snr {
            snr.push(s.observed_at, v);
        }
        if let Some(v) = s.rssi {
            rssi.push(s.observed_at, v);
        }
        if let Some(v) = s.spreading_factor.filter(|v| *v > 0.0) {
            spreading_factor.push(s.observed_at, v);
        }
    }

    let datasets: Vec<StatusDataset> = [dr, frequency, snr, rssi, spreading_factor, battery]
        .into_iter()
        .filter(|d| !d.data.is_empty())
        .collect();

    let scales = datasets
        .iter()
        .map(|d| {
            let scale = match d.y_axis_id.as_str() {
                "yBatteryLevel" => ChartScale::new(&d.label, "right", 1.0, 99.0),
                "yDR" => ChartScale::new(&d.label, "left", 0.0, 7.0),
                "yFrequency" => ChartScale::new(&d.label, "left", 863.0, 870.0),
                "yLoRaSNR" => ChartScale::new(&d.label, "left", -20.0, 10.0),
                "yRSSI" => ChartScale::new(&d.label, "left", -120.0, -30.0),
                _ => ChartScale::new(&d.label, "left", 0.0, 12.0),
            };
            (d.y_axis_id.clone(), scale)
        })
        .collect();

    let observed: Vec<DateTime<Utc>> = statuses.iter().filter_map(|s| s.observed_at).collect();
    let format = |t: Option<&DateTime<Utc>>| {
        t.map(|t| t.format(LABEL_FORMAT).to_string())
            .unwrap_or_default()
    };

    StatusChart {
        datasets,
        scales,
        time_at: format(observed.iter().min()),
        end_time_at: format(observed.iter().max()),
    }
}
