use crate::client::{Envelope, Upstream};
use crate::context::RequestContext;
use crate::errors::Result;
use crate::model::{
    Alarm, DeviceProfile, DeviceStatus, MeasurementData, MeasurementValue, Paged, Sensor,
    SensorIdentifier,
};
use crate::paging::QueryParams;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::warn;

/// Query parameters for the measurement service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementQuery {
    params: QueryParams,
}

impl MeasurementQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_n(mut self, last_n: bool) -> Self {
        self.params.set("lastN", &last_n.to_string());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.params.set("limit", &limit.to_string());
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.params.set("timerel", "between");
        self.params
            .set("timeat", &start.to_rfc3339_opts(SecondsFormat::Secs, true));
        self.params
            .set("endTimeAt", &end.to_rfc3339_opts(SecondsFormat::Secs, true));
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.params.set("reverse", &reverse.to_string());
        self
    }

    pub fn aggr_methods(mut self, methods: &str) -> Self {
        self.params.set("aggrMethods", methods);
        self
    }

    pub fn time_unit(mut self, unit: &str) -> Self {
        self.params.set("timeunit", unit);
        self
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }
}

/// `limit` and `offset` followed by caller filters, which win on conflict.
pub(crate) fn list_params(offset: u64, limit: u64, filters: &QueryParams) -> QueryParams {
    let mut params = QueryParams::new();
    params.add("limit", &limit.to_string());
    params.add("offset", &offset.to_string());
    params.merge(filters);
    params
}

/// Decodes a list envelope, taking paging metadata from the response when present.
pub(crate) fn paged<T: serde::de::DeserializeOwned>(
    envelope: &Envelope,
    offset: u64,
    limit: u64,
) -> Result<Paged<T>> {
    let items: Vec<T> = envelope.decode()?;
    let meta = envelope.meta.as_ref();

    Ok(Paged::new(
        items,
        envelope.total_records(),
        meta.and_then(|m| m.offset).unwrap_or(offset),
        meta.and_then(|m| m.limit).unwrap_or(limit),
    ))
}

impl Upstream {
    pub async fn get_sensor(&self, ctx: &RequestContext, id: &str) -> Result<Sensor> {
        let envelope = self
            .client
            .get(ctx, &self.urls.devices, id, &QueryParams::new())
            .await?;
        envelope.decode()
    }

    pub async fn get_sensors(
        &self,
        ctx: &RequestContext,
        offset: u64,
        limit: u64,
        filters: &QueryParams,
    ) -> Result<Paged<Sensor>> {
        let params = list_params(offset, limit, filters);
        let envelope = self
            .client
            .get(ctx, &self.urls.devices, "", &params)
            .await?;
        paged(&envelope, offset, limit)
    }

    pub async fn get_sensor_status(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<Vec<DeviceStatus>> {
        let envelope = self
            .client
            .get(
                ctx,
                &self.urls.devices,
                &format!("{}/status", id),
                &QueryParams::new(),
            )
            .await?;
        envelope.decode()
    }

    pub async fn update_sensor(
        &self,
        ctx: &RequestContext,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        self.client.patch(ctx, &self.urls.devices, id, fields).await
    }

    /// Tenants the caller may assign. Empty when the admin service is unavailable.
    pub async fn get_tenants(&self, ctx: &RequestContext) -> Vec<String> {
        let result = async {
            self.client
                .get(ctx, &self.urls.admin, "tenants", &QueryParams::new())
                .await?
                .decode::<Vec<String>>()
        }
        .await;

        result.unwrap_or_else(|e| {
            warn!("Failed to fetch tenants: {}", e);
            Vec::new()
        })
    }

    /// Known device profiles. Empty when the admin service is unavailable.
    pub async fn get_device_profiles(&self, ctx: &RequestContext) -> Vec<DeviceProfile> {
        let result = async {
            self.client
                .get(ctx, &self.urls.admin, "deviceprofiles", &QueryParams::new())
                .await?
                .decode::<Vec<DeviceProfile>>()
        }
        .await;

        result.unwrap_or_else(|e| {
            warn!("Failed to fetch device profiles: {}", e);
            Vec::new()
        })
    }

    /// Exported records in the `accept` format, chosen by the admin service
    /// from the `export` parameter.
    pub async fn export(
        &self,
        ctx: &RequestContext,
        query: &QueryParams,
        accept: &str,
    ) -> Result<Vec<u8>> {
        self.client
            .get_bytes(ctx, &self.urls.admin, "export", query, accept)
            .await
    }

    /// Hands an uploaded file of `kind` records to the admin service.
    pub async fn import(
        &self,
        ctx: &RequestContext,
        kind: &str,
        content_type: &str,
        file: Vec<u8>,
    ) -> Result<()> {
        let mut query = QueryParams::new();
        query.set("type", kind);
        self.client
            .post_bytes(ctx, &self.urls.admin, "import", &query, content_type, file)
            .await
    }

    /// Latest value of every measurement a device reports.
    pub async fn get_measurement_info(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<Vec<MeasurementValue>> {
        let envelope = self
            .client
            .get(ctx, &self.urls.measurements, id, &QueryParams::new())
            .await?;
        envelope.decode()
    }

    pub async fn get_measurement_data(
        &self,
        ctx: &RequestContext,
        id: Option<&str>,
        query: &MeasurementQuery,
    ) -> Result<MeasurementData> {
        let mut params = QueryParams::new();
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            params.add("id", id);
        }
        params.merge(query.params());

        let envelope = self
            .client
            .get(ctx, &self.urls.measurements, "", &params)
            .await?;
        envelope.decode()
    }

    pub async fn get_alarms(
        &self,
        ctx: &RequestContext,
        offset: u64,
        limit: u64,
        filters: &QueryParams,
    ) -> Result<Paged<Alarm>> {
        let params = list_params(offset, limit, filters);
        let envelope = self.client.get(ctx, &self.urls.alarms, "", &params).await?;
        paged(&envelope, offset, limit)
    }

    /// Sensors able to deliver any of the given measurement types.
    pub async fn get_valid_sensors(
        &self,
        ctx: &RequestContext,
        urns: &[String],
    ) -> Result<Vec<SensorIdentifier>> {
        let params = QueryParams::from_pairs(urns.iter().map(|urn| ("urn", urn.as_str())));
        let envelope = self
            .client
            .get(ctx, &self.urls.devices, "", &params)
            .await?;
        let sensors: Vec<Sensor> = envelope.decode()?;

        Ok(sensors
            .into_iter()
            .map(|s| SensorIdentifier {
                sensor_id: s.sensor_id.unwrap_or_default(),
                decoder: s
                    .device_profile
                    .map(|p| p.decoder)
                    .unwrap_or_default(),
                device_id: s.device_id,
            })
            .collect())
    }
}
