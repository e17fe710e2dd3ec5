//! HTML output. Composers hand finished view models to a [`Renderer`]; the
//! shipped [`HtmlRenderer`] writes plain semantic markup with htmx attributes.

use crate::chart::{ChartDataset, LABEL_FORMAT};
use crate::context::{RequestContext, Section};
use crate::model::{Measurement, Statistics};
use crate::paging::{Paging, QueryParams};
use crate::views::home::{AlarmList, UsageChart};
use crate::views::sensors::{SensorDetails, SensorList, TypeOption};
use crate::views::things::{NewThingForm, ThingChartView, ThingDetails, ThingList, ThingRow};
use crate::VERSION;
use chrono::{DateTime, Utc};
use maud::{html, Markup, DOCTYPE};
use serde::Serialize;

pub trait Renderer: Send + Sync {
    fn home_page(&self, ctx: &RequestContext, alarms: &AlarmList) -> String;
    fn statistics(&self, statistics: &Statistics) -> String;
    fn usage_chart(&self, usage: &UsageChart) -> String;
    fn alarm_table(&self, alarms: &AlarmList) -> String;

    fn sensor_list_page(&self, ctx: &RequestContext, list: &SensorList) -> String;
    /// Table or map, depending on the list's map flag.
    fn sensor_data_list(&self, list: &SensorList) -> String;
    fn sensor_table(&self, list: &SensorList) -> String;
    fn sensor_details_page(&self, ctx: &RequestContext, details: &SensorDetails) -> String;
    fn sensor_details(&self, details: &SensorDetails, edit: bool) -> String;
    fn measurement_chart(&self, dataset: &ChartDataset) -> String;
    fn type_options(&self, options: &[TypeOption]) -> String;

    fn thing_list_page(&self, ctx: &RequestContext, list: &ThingList) -> String;
    fn thing_data_list(&self, list: &ThingList) -> String;
    fn thing_table(&self, list: &ThingList) -> String;
    fn thing_details_page(&self, ctx: &RequestContext, details: &ThingDetails) -> String;
    fn thing_details(&self, details: &ThingDetails) -> String;
    fn thing_chart(&self, chart: &ThingChartView) -> String;
    fn new_thing_form(&self, form: &NewThingForm) -> String;
    fn delete_thing(&self, id: &str, name: &str) -> String;

    fn admin_page(&self, ctx: &RequestContext) -> String;
    fn error_page(&self, ctx: &RequestContext) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer;

const NAV: [(Section, &str, &str); 4] = [
    (Section::Home, "/home", "Home"),
    (Section::Sensors, "/sensors", "Sensors"),
    (Section::Things, "/things", "Things"),
    (Section::Admin, "/admin", "Admin"),
];

const EXPORTS: [(&str, &str); 2] = [("devices", "Sensors"), ("things", "Things")];

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format(LABEL_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn measurement_value(m: &Measurement) -> String {
    if let Some(v) = m.value {
        format!("{} {}", v, m.unit).trim_end().to_string()
    } else if let Some(b) = m.bool_value {
        b.to_string()
    } else if let Some(s) = &m.string_value {
        s.clone()
    } else if let Some(c) = m.count {
        c.to_string()
    } else {
        "-".to_string()
    }
}

fn layout(ctx: &RequestContext, title: &str, content: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="sv" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "Dashboard | " (title) }
                link rel="stylesheet" href="/assets/css/dashboard.css";
                script src="/assets/js/htmx.min.js" defer {}
                script src="/assets/js/chart.umd.min.js" defer {}
                script src="/assets/js/dashboard.js" defer {}
            }
            body hx-boost="true" data-version=(VERSION) data-section=(ctx.section.as_str()) {
                nav #navigation {
                    ul {
                        @for (section, href, label) in NAV {
                            li {
                                a href=(href) aria-current=[(ctx.section == section).then_some("page")] { (label) }
                            }
                        }
                    }
                }
                main #main { (content) }
            }
        }
    }
    .into_string()
}

fn pager(paging: &Paging) -> Markup {
    html! {
        nav .pager {
            @for page in &paging.pages {
                a .current[*page == paging.page_index]
                    href="#"
                    hx-get=(paging.href(*page))
                    hx-target=(paging.target_id)
                    hx-swap="outerHTML" { (page) }
            }
            span .summary { (paging.count) " of " (paging.total) }
        }
    }
}

fn chart_canvas(kind: &str, datasets: &str, options: Option<String>) -> Markup {
    html! {
        canvas .chart
            data-kind=(kind)
            data-datasets=(datasets)
            data-options=[options] {}
    }
}

fn statistics_cards(statistics: &Statistics) -> Markup {
    let cards = [
        ("Total", statistics.total),
        ("Active", statistics.active),
        ("Inactive", statistics.inactive),
        ("Online", statistics.online),
        ("Unknown", statistics.unknown),
    ];

    html! {
        section .overview-cards {
            @for (label, value) in cards {
                div .card {
                    span .card-label { (label) }
                    span .card-value { (value) }
                }
            }
        }
    }
}

fn alarm_table_markup(alarms: &AlarmList) -> Markup {
    html! {
        div #tableview {
            table .alarms {
                thead { tr { th { "Sensor" } th { "Observed" } th { "Alarms" } } }
                tbody {
                    @for alarm in &alarms.alarms {
                        tr {
                            td { a href={ "/sensors/" (alarm.device_id) } { (alarm.device_id) } }
                            td { (timestamp(Some(alarm.observed_at))) }
                            td { (alarm.types.join(", ")) }
                        }
                    }
                }
            }
            (pager(&alarms.paging))
        }
    }
}

fn sensor_table_markup(list: &SensorList) -> Markup {
    html! {
        div #tableview {
            table .sensors {
                thead {
                    tr {
                        th { "Name" } th { "Id" } th { "DevEUI" } th { "Type" }
                        th { "Active" } th { "Battery" } th { "Last seen" }
                    }
                }
                tbody {
                    @for sensor in &list.sensors {
                        tr .alert[sensor.has_alerts] {
                            td { a href={ "/sensors/" (sensor.device_id) } { (sensor.name) } }
                            td { (sensor.device_id) }
                            td { (sensor.dev_eui) }
                            td { (sensor.sensor_type) }
                            td { @if sensor.active { "yes" } @else { "no" } }
                            td {
                                @if sensor.battery_level < 0 { "-" } @else { (sensor.battery_level) "%" }
                            }
                            td { (timestamp(sensor.last_seen)) }
                        }
                    }
                }
            }
            (pager(&list.paging))
        }
    }
}

fn sensor_map_markup(list: &SensorList) -> Markup {
    html! {
        div #map .map {
            @for sensor in &list.sensors {
                div .marker
                    data-id=(sensor.device_id)
                    data-name=(sensor.name)
                    data-lat=(sensor.location.latitude)
                    data-lon=(sensor.location.longitude) {}
            }
        }
    }
}

fn view_toggle(url: &str, map_view: bool) -> Markup {
    html! {
        div .view-toggle {
            a .active[!map_view] href="#" hx-get={ (url) "?mapview=false" } hx-target="#datalist" { "List" }
            a .active[map_view] href="#" hx-get={ (url) "?mapview=true" } hx-target="#datalist" { "Map" }
        }
    }
}

fn sensor_data_list_markup(list: &SensorList) -> Markup {
    html! {
        div #datalist {
            (view_toggle("/components/sensors/list", list.map_view))
            @if list.map_view {
                (sensor_map_markup(list))
            } @else {
                (sensor_table_markup(list))
            }
        }
    }
}

fn sensor_details_markup(details: &SensorDetails) -> Markup {
    let status = &details.device_status;
    html! {
        section #sensor-details {
            header {
                h1 { (details.name) }
                button hx-get={ "/components/sensors/details/edit?id=" (details.device_id) }
                    hx-target="#sensor-details" hx-swap="outerHTML" { "Edit" }
            }
            dl {
                dt { "Id" } dd { (details.device_id) }
                dt { "DevEUI" } dd { (details.dev_eui) }
                dt { "Type" } dd { (details.device_profile) }
                dt { "Organisation" } dd { (details.tenant) }
                dt { "Description" } dd { (details.description) }
                dt { "Environment" } dd { (details.environment) }
                dt { "Interval" } dd { (details.interval) }
                dt { "Active" } dd { @if details.active { "yes" } @else { "no" } }
                dt { "Location" } dd { (details.location.latitude) ", " (details.location.longitude) }
                dt { "Last seen" } dd { (timestamp(details.observed_at)) }
                dt { "Battery" }
                dd hx-get={ "/components/sensors/" (details.device_id) "/batterylevel" } hx-trigger="load" { "-" }
                dt { "RSSI" } dd { (status.rssi.map(|v| v.to_string()).unwrap_or_default()) }
                dt { "SNR" } dd { (status.lora_snr.map(|v| v.to_string()).unwrap_or_default()) }
            }
            h2 { "Types" }
            ul { @for urn in &details.types { li { (urn) } } }
            h2 { "Measurements" }
            table .measurements {
                tbody {
                    @for m in &details.measurements {
                        tr {
                            td { (m.id.clone().unwrap_or_default()) }
                            td { (timestamp(Some(m.timestamp))) }
                            td { (m.value.map(|v| v.to_string()).unwrap_or_default()) }
                        }
                    }
                }
            }
            form hx-get="/components/measurements" hx-target="#measurement-chart" hx-trigger="change" {
                select name="sensorMeasurementTypes" {
                    option value="" { "-" }
                    @for id in &details.measurement_types {
                        option value=(id) { (id) }
                    }
                }
            }
            div #measurement-chart {}
            div #status-chart hx-get={ "/components/sensors/status/" (details.device_id) } hx-trigger="load" {}
        }
    }
}

fn sensor_edit_markup(details: &SensorDetails) -> Markup {
    let types_url = format!("/components/admin/types?id={}", details.device_id);
    let decoder = details
        .device_profiles
        .iter()
        .find(|p| p.name == details.device_profile)
        .map(|p| p.decoder.as_str())
        .unwrap_or_default();

    html! {
        section #sensor-details {
            form method="post" action="/components/sensors/details" {
                input type="hidden" name="id" value=(details.device_id);
                label { "Name" input type="text" name="name" value=(details.name); }
                label { "Description" textarea name="description" { (details.description) } }
                label { "Latitude" input type="text" name="latitude" value=(details.location.latitude); }
                label { "Longitude" input type="text" name="longitude" value=(details.location.longitude); }
                label { "Environment" input type="text" name="environment" value=(details.environment); }
                label { "Interval" input type="text" name="interval" value=(details.interval); }
                label {
                    "Active"
                    input type="hidden" name="active" value="off";
                    input type="checkbox" name="active" value="on" checked[details.active];
                }
                label {
                    "Organisation"
                    select name="organisation" {
                        @for tenant in &details.organisations {
                            option value=(tenant) selected[*tenant == details.tenant] { (tenant) }
                        }
                    }
                }
                label {
                    "Sensor type"
                    select name="sensorType" hx-get=(types_url) hx-target="#measurement-types" {
                        @for profile in &details.device_profiles {
                            option value=(profile.decoder) selected[profile.name == details.device_profile] { (profile.name) }
                        }
                    }
                }
                div #measurement-types hx-get={ (types_url) "&sensorType=" (decoder) } hx-trigger="load" {}
                button type="submit" name="save" value="true" { "Save" }
                a href={ "/sensors/" (details.device_id) } { "Cancel" }
            }
        }
    }
}

fn thing_table_markup(list: &ThingList) -> Markup {
    html! {
        div #tableview {
            table .things {
                thead {
                    tr { th { "Name" } th { "Type" } th { "Organisation" } th { "Tags" } th { "Latest" } th { "Observed" } }
                }
                tbody {
                    @for thing in &list.things {
                        tr {
                            td { a href={ "/things/" (thing.id) } { (thing.name) } }
                            td {
                                (thing.thing_type)
                                @if !thing.sub_type.is_empty() { " / " (thing.sub_type) }
                            }
                            td { (thing.tenant) }
                            td { (thing.tags.join(", ")) }
                            td { @if let Some(m) = thing.measurements.last() { (measurement_value(m)) } }
                            td { (timestamp(thing.observed_at)) }
                        }
                    }
                }
            }
            (pager(&list.paging))
        }
    }
}

fn thing_map_markup(list: &ThingList) -> Markup {
    html! {
        div #map .map {
            @for thing in &list.things {
                div .marker
                    data-id=(thing.id)
                    data-name=(thing.name)
                    data-type=(thing.thing_type)
                    data-lat=(thing.location.latitude)
                    data-lon=(thing.location.longitude)
                    data-properties=(json(&thing.properties)) {}
            }
        }
    }
}

fn thing_data_list_markup(list: &ThingList) -> Markup {
    html! {
        div #datalist {
            (view_toggle("/components/things/list", list.map_view))
            @if list.map_view {
                (thing_map_markup(list))
            } @else {
                (thing_table_markup(list))
            }
        }
    }
}

fn chart_link(details: &ThingDetails, tab: &str) -> String {
    let mut query = QueryParams::new();
    query.add("type", &details.thing.thing_type);
    query.add("subType", &details.thing.sub_type);
    query.add("tab", tab);
    format!("/components/things/measurements/{}?{}", details.thing.id, query.encode())
}

fn delete_link(thing: &ThingRow) -> String {
    let mut query = QueryParams::new();
    query.add("name", &thing.name);
    format!("/components/things/{}?{}", thing.id, query.encode())
}

fn thing_details_markup(details: &ThingDetails) -> Markup {
    let thing = &details.thing;
    html! {
        section #thing-details data-type=(details.thing_type) {
            header {
                h1 { (thing.name) }
                @if !thing.alternative_name.is_empty() { p .alternative-name { (thing.alternative_name) } }
                button hx-get={ "/components/things/" (thing.id) "?mode=edit" }
                    hx-target="#thing-details" hx-swap="outerHTML" { "Edit" }
                button hx-delete=(delete_link(thing)) hx-target="#dialog" { "Delete" }
            }
            dl {
                dt { "Id" } dd { (thing.id) }
                dt { "Description" } dd { (thing.description) }
                dt { "Organisation" } dd { (details.tenant) }
                dt { "Tags" } dd { (thing.tags.join(", ")) }
                dt { "Devices" } dd { (thing.ref_devices.join(", ")) }
                dt { "Location" } dd { (thing.location.latitude) ", " (thing.location.longitude) }
                @for (key, value) in &thing.properties {
                    dt { (key) } dd { (value.to_string()) }
                }
            }
            nav .tabs {
                @for tab in &details.tabs {
                    a href="#" hx-get=(chart_link(details, tab)) hx-target="#thing-chart" {
                        @if let Some(m) = details.latest.get(tab) {
                            (tab) ": " (measurement_value(m))
                        } @else {
                            (tab)
                        }
                    }
                }
            }
            @if let Some(first) = details.tabs.first() {
                div #thing-chart hx-get=(chart_link(details, first)) hx-trigger="load" {}
            }
            div #dialog {}
        }
    }
}

fn thing_edit_markup(details: &ThingDetails) -> Markup {
    let thing = &details.thing;
    let edit = details.edit.clone().unwrap_or_default();
    html! {
        section #thing-details {
            form hx-post={ "/components/things/" (thing.id) } hx-target="#thing-details" hx-swap="outerHTML" {
                label { "Name" input type="text" name="name" value=(thing.name); }
                label { "Alternative name" input type="text" name="alternativeName" value=(thing.alternative_name); }
                label { "Description" textarea name="description" { (thing.description) } }
                label { "Latitude" input type="text" name="latitude" value=(thing.location.latitude); }
                label { "Longitude" input type="text" name="longitude" value=(thing.location.longitude); }
                label {
                    "Organisation"
                    select name="organisation" {
                        @for tenant in &edit.organisations {
                            option value=(tenant) selected[*tenant == details.tenant] { (tenant) }
                        }
                    }
                }
                label {
                    "Tags"
                    input type="text" name="selectedTags" list="known-tags" value=(thing.tags.join(","));
                    datalist #known-tags { @for tag in &edit.tags { option value=(tag) {} } }
                }
                label {
                    "Device"
                    select name="currentDevice" {
                        option value="" { "-" }
                        @for sensor in &edit.valid_sensors {
                            option value=(sensor.device_id) selected[thing.ref_devices.contains(&sensor.device_id)] {
                                (sensor.device_id) " (" (sensor.decoder) ")"
                            }
                        }
                    }
                }
                @if details.thing_type.starts_with("container") {
                    @for key in ["maxd", "maxl", "angle", "offset"] {
                        label {
                            (key)
                            input type="text" name=(key)
                                value=(thing.properties.get(key).map(|v| v.to_string()).unwrap_or_default());
                        }
                    }
                }
                button type="submit" name="save" value="true" { "Save" }
                a href={ "/things/" (thing.id) } { "Cancel" }
            }
        }
    }
}

impl Renderer for HtmlRenderer {
    fn home_page(&self, ctx: &RequestContext, alarms: &AlarmList) -> String {
        layout(
            ctx,
            "Home",
            html! {
                div #statistics hx-get="/components/home/statistics" hx-trigger="load" {}
                div #usage hx-get="/components/home/usage" hx-trigger="load" {}
                h2 { "Alarms" }
                (alarm_table_markup(alarms))
            },
        )
    }

    fn statistics(&self, statistics: &Statistics) -> String {
        statistics_cards(statistics).into_string()
    }

    fn usage_chart(&self, usage: &UsageChart) -> String {
        let options = format!(r#"{{"xScaleMax":{}}}"#, usage.x_scale_max);
        chart_canvas("bar", &json(&usage.datasets), Some(options)).into_string()
    }

    fn alarm_table(&self, alarms: &AlarmList) -> String {
        alarm_table_markup(alarms).into_string()
    }

    fn sensor_list_page(&self, ctx: &RequestContext, list: &SensorList) -> String {
        layout(
            ctx,
            "Sensors",
            html! {
                h1 { "Sensors" }
                @if let Some(statistics) = &list.statistics { (statistics_cards(statistics)) }
                (sensor_data_list_markup(list))
            },
        )
    }

    fn sensor_data_list(&self, list: &SensorList) -> String {
        sensor_data_list_markup(list).into_string()
    }

    fn sensor_table(&self, list: &SensorList) -> String {
        sensor_table_markup(list).into_string()
    }

    fn sensor_details_page(&self, ctx: &RequestContext, details: &SensorDetails) -> String {
        layout(ctx, &details.name, sensor_details_markup(details))
    }

    fn sensor_details(&self, details: &SensorDetails, edit: bool) -> String {
        if edit {
            sensor_edit_markup(details).into_string()
        } else {
            sensor_details_markup(details).into_string()
        }
    }

    fn measurement_chart(&self, dataset: &ChartDataset) -> String {
        chart_canvas("line", &json(&[dataset]), None).into_string()
    }

    fn type_options(&self, options: &[TypeOption]) -> String {
        html! {
            fieldset .checkbox-dropdown {
                legend { "Measurement types" }
                @for option in options {
                    label {
                        input type="checkbox" name=(option.name) value=(option.value) checked[option.selected];
                        (option.text)
                    }
                }
            }
        }
        .into_string()
    }

    fn thing_list_page(&self, ctx: &RequestContext, list: &ThingList) -> String {
        layout(
            ctx,
            "Things",
            html! {
                h1 { "Things" }
                form .filters hx-get="/components/things/list" hx-target="#datalist" hx-trigger="change" {
                    select name="type" {
                        option value="" { "All types" }
                        @for t in &list.types { option value=(t) { (t) } }
                    }
                    select name="tags" {
                        option value="" { "All tags" }
                        @for tag in &list.tags { option value=(tag) { (tag) } }
                    }
                }
                button hx-get="/components/things" hx-target="#dialog" { "New" }
                div #dialog {}
                (thing_data_list_markup(list))
            },
        )
    }

    fn thing_data_list(&self, list: &ThingList) -> String {
        thing_data_list_markup(list).into_string()
    }

    fn thing_table(&self, list: &ThingList) -> String {
        thing_table_markup(list).into_string()
    }

    fn thing_details_page(&self, ctx: &RequestContext, details: &ThingDetails) -> String {
        let content = if details.edit.is_some() {
            thing_edit_markup(details)
        } else {
            thing_details_markup(details)
        };
        layout(ctx, &details.thing.name, content)
    }

    fn thing_details(&self, details: &ThingDetails) -> String {
        if details.edit.is_some() {
            thing_edit_markup(details).into_string()
        } else {
            thing_details_markup(details).into_string()
        }
    }

    fn thing_chart(&self, chart: &ThingChartView) -> String {
        let first = chart.datasets.first();
        html! {
            (chart_canvas(chart.presentation.kind.as_str(), &json(&chart.datasets), Some(json(&chart.presentation))))
            table .statistics {
                caption {
                    (timestamp(Some(chart.window.start))) " - " (timestamp(Some(chart.window.end)))
                }
                tbody {
                    @if let Some(dataset) = first {
                        @for (at, value) in &dataset.data {
                            tr { td { (at) } td { (value) } }
                        }
                    }
                }
            }
        }
        .into_string()
    }

    fn new_thing_form(&self, form: &NewThingForm) -> String {
        html! {
            form .new-thing method="post" action="/things" {
                label {
                    "Type"
                    select name="type" { @for t in &form.types { option value=(t) { (t) } } }
                }
                label { "Name" input type="text" name="name" required; }
                label { "Description" textarea name="description" {} }
                label {
                    "Organisation"
                    select name="organisation" { @for tenant in &form.organisations { option value=(tenant) { (tenant) } } }
                }
                button type="submit" name="save" value="true" { "Create" }
                button type="submit" { "Cancel" }
            }
        }
        .into_string()
    }

    fn delete_thing(&self, id: &str, name: &str) -> String {
        html! {
            div .confirm-delete {
                p { "Delete " strong { (name) } "?" }
                button hx-delete={ "/things/" (id) "?confirmed=true" } hx-target="body" { "Delete" }
                button hx-get={ "/components/things/" (id) } hx-target="#thing-details" hx-swap="outerHTML" { "Cancel" }
            }
        }
        .into_string()
    }

    fn admin_page(&self, ctx: &RequestContext) -> String {
        layout(
            ctx,
            "Admin",
            html! {
                h1 { "Admin" }
                p { "Signed in: " @if ctx.token().is_empty() { "no" } @else { "yes" } }
                section #export {
                    h2 { "Export" }
                    @for (export, label) in EXPORTS {
                        button hx-get={ "/admin/export?export=" (export) "&accept=text/csv" } { (label) }
                    }
                }
                section #import {
                    h2 { "Import" }
                    form method="post" action="/admin/import" enctype="multipart/form-data" {
                        select name="type" {
                            @for (export, label) in EXPORTS {
                                option value=(export) { (label) }
                            }
                        }
                        input type="file" name="file" accept=".csv,text/csv";
                        button type="submit" { "Import" }
                    }
                }
            },
        )
    }

    fn error_page(&self, ctx: &RequestContext) -> String {
        layout(
            ctx,
            "Error",
            html! {
                h1 { "Something went wrong" }
                p { "The page could not be shown. Try again in a moment." }
                a href="/home" { "Back to start" }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceProfile, DeviceStatus, Location};
    use crate::views::sensors::SensorRow;
    use crate::views::ListRequest;

    fn sensor_list(map_view: bool) -> SensorList {
        let request = ListRequest::from_query(&QueryParams::parse("page=2&limit=10&type=elsys"));
        SensorList {
            sensors: vec![SensorRow {
                device_id: "dev-1".to_string(),
                dev_eui: "eui".to_string(),
                name: "<b>Temp</b>".to_string(),
                active: true,
                sensor_type: "elsys".to_string(),
                location: Location::default(),
                last_seen: None,
                battery_level: -1,
                has_alerts: false,
            }],
            statistics: Some(Statistics::default()),
            paging: request.paging(1, 23, "/components/tables/sensors"),
            map_view,
        }
    }

    #[test]
    fn test_page_marks_current_section() {
        let ctx = RequestContext::new("t").in_section(Section::Sensors);
        let html = HtmlRenderer.sensor_list_page(&ctx, &sensor_list(false));

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"href="/sensors" aria-current="page""#));
        assert!(!html.contains(r#"href="/things" aria-current"#));
        assert!(html.contains("&lt;b&gt;Temp&lt;/b&gt;"));
    }

    #[test]
    fn test_pager_links_keep_filters() {
        let html = HtmlRenderer.sensor_table(&sensor_list(false));

        assert!(html.contains(r#"hx-get="/components/tables/sensors?page=3&amp;limit=10&amp;type=elsys""#));
        assert!(html.contains(r##"hx-target="#tableview""##));
    }

    #[test]
    fn test_data_list_switches_to_map() {
        let html = HtmlRenderer.sensor_data_list(&sensor_list(true));

        assert!(html.contains(r#"id="map""#));
        assert!(!html.contains(r#"id="tableview""#));
    }

    #[test]
    fn test_delete_confirmation() {
        let html = HtmlRenderer.delete_thing("t1", "Bin");

        assert!(html.contains(r#"hx-delete="/things/t1?confirmed=true""#));
        assert!(html.contains("<strong>Bin</strong>"));
    }

    #[test]
    fn test_sensor_edit_form() {
        let details = SensorDetails {
            device_id: "dev-1".to_string(),
            dev_eui: "eui".to_string(),
            name: "Temp".to_string(),
            location: Location::default(),
            device_profile: "Elsys".to_string(),
            tenant: "default".to_string(),
            description: String::new(),
            active: false,
            types: vec!["urn:oma:lwm2m:ext:3303".to_string()],
            environment: String::new(),
            interval: 3600,
            observed_at: None,
            device_status: DeviceStatus::default(),
            measurement_types: Vec::new(),
            measurements: Vec::new(),
            organisations: vec!["default".to_string()],
            device_profiles: vec![DeviceProfile {
                name: "Elsys".to_string(),
                decoder: "elsys".to_string(),
                interval: 3600,
                types: None,
            }],
        };

        let html = HtmlRenderer.sensor_details(&details, true);

        let hidden = html.find(r#"type="hidden" name="active" value="off""#).unwrap();
        let checkbox = html.find(r#"type="checkbox" name="active" value="on""#).unwrap();
        assert!(hidden < checkbox);
        assert!(html.contains(
            r#"hx-get="/components/admin/types?id=dev-1&amp;sensorType=elsys" hx-trigger="load""#
        ));
    }

    #[test]
    fn test_error_page_carries_version() {
        let ctx = RequestContext::new("t").in_section(Section::Error);
        let html = HtmlRenderer.error_page(&ctx);

        assert!(html.contains(&format!(r#"data-version="{}""#, VERSION)));
        assert!(html.contains(r#"data-section="error""#));
        assert!(!html.contains("aria-current"));
    }

    #[test]
    fn test_admin_page_offers_export_and_import() {
        let html = HtmlRenderer.admin_page(&RequestContext::new("t").in_section(Section::Admin));

        assert!(html.contains(r#"hx-get="/admin/export?export=devices&amp;accept=text/csv""#));
        assert!(html.contains(r#"enctype="multipart/form-data""#));
    }
}
