use crate::client::Upstream;
use crate::context::RequestContext;
use crate::devices::{list_params, paged};
use crate::errors::Result;
use crate::model::{Measurement, NewThing, Paged, Thing};
use crate::paging::QueryParams;
use chrono::{Duration, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
struct ThingTypeName {
    #[serde(default)]
    name: String,
}

/// Splits `type=a-b` into `type=a&subType=b`.
fn split_type_filter(params: &mut QueryParams) {
    let Some(thing_type) = params.get("type").map(str::to_string) else {
        return;
    };

    if let Some((main, sub)) = thing_type.split_once('-') {
        params.set("type", main);
        params.set("subType", sub);
    }
}

impl Upstream {
    /// Fetches one thing with the last 24 hours of values unless `extra` asks otherwise.
    pub async fn get_thing(
        &self,
        ctx: &RequestContext,
        id: &str,
        extra: &QueryParams,
    ) -> Result<Thing> {
        let since = Utc::now() - Duration::hours(24);

        let mut params = QueryParams::new();
        params.add("timerel", "after");
        params.add("timeat", &since.to_rfc3339_opts(SecondsFormat::Secs, true));
        params.merge(extra);

        let envelope = self.client.get(ctx, &self.urls.things, id, &params).await?;
        envelope.decode()
    }

    pub async fn get_things(
        &self,
        ctx: &RequestContext,
        offset: u64,
        limit: u64,
        filters: &QueryParams,
    ) -> Result<Paged<Thing>> {
        let mut params = list_params(offset, limit, filters);
        split_type_filter(&mut params);

        let envelope = self.client.get(ctx, &self.urls.things, "", &params).await?;
        paged(&envelope, offset, limit)
    }

    /// Most recent value of every series the thing has.
    pub async fn get_latest_values(
        &self,
        ctx: &RequestContext,
        thing_id: &str,
    ) -> Result<Vec<Measurement>> {
        let mut params = QueryParams::new();
        params.add("thingid", thing_id);
        params.add("latest", "true");

        let envelope = self
            .client
            .get(ctx, &self.urls.things, "values", &params)
            .await?;
        envelope.decode()
    }

    pub async fn new_thing(&self, ctx: &RequestContext, mut thing: NewThing) -> Result<()> {
        if let Some((main, sub)) = thing.thing_type.split_once('-') {
            thing.sub_type = Some(sub.to_string());
            thing.thing_type = main.to_string();
        }

        self.client.post(ctx, &self.urls.things, &thing).await
    }

    pub async fn update_thing(
        &self,
        ctx: &RequestContext,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        self.client.patch(ctx, &self.urls.things, id, fields).await
    }

    pub async fn delete_thing(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        self.client.delete(ctx, &self.urls.things, id).await
    }

    pub async fn get_tags(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        self.client
            .get(ctx, &self.urls.things, "tags", &QueryParams::new())
            .await?
            .decode()
    }

    /// Display names of the known thing types.
    pub async fn get_types(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        let types: Vec<ThingTypeName> = self
            .client
            .get(ctx, &self.urls.things, "types", &QueryParams::new())
            .await?
            .decode()?;

        Ok(types.into_iter().map(|t| t.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::UpstreamClient;
    use crate::config::Upstreams;
    use crate::model::Location;
    use serde_json::json;
    use std::time::Duration as StdDuration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn upstream(server: &MockServer) -> Upstream {
        Upstream::new(
            UpstreamClient::new(StdDuration::from_secs(5)).unwrap(),
            Upstreams::with_base(&server.uri()),
        )
    }

    fn ctx() -> RequestContext {
        RequestContext::new("token")
    }

    #[test]
    fn test_split_type_filter() {
        let mut params = QueryParams::parse("type=container-wastecontainer&limit=5");
        split_type_filter(&mut params);
        assert_eq!(
            params.encode(),
            "type=container&limit=5&subType=wastecontainer"
        );

        let mut plain = QueryParams::parse("type=sewer");
        split_type_filter(&mut plain);
        assert_eq!(plain.encode(), "type=sewer");
    }

    #[tokio::test]
    async fn test_get_things_falls_back_to_requested_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/things"))
            .and(query_param("type", "container"))
            .and(query_param("subType", "sandstorage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": {"totalRecords": 1, "count": 1},
                "data": [{"id": "t1", "type": "Container", "values": []}]
            })))
            .mount(&server)
            .await;

        let page = upstream(&server)
            .get_things(&ctx(), 30, 15, &QueryParams::parse("type=container-sandstorage"))
            .await
            .unwrap();

        assert_eq!(page.offset, 30);
        assert_eq!(page.limit, 15);
        assert_eq!(page.total_records, 1);
        assert_eq!(page.items[0].id, "t1");
    }

    #[tokio::test]
    async fn test_get_thing_extra_params_override() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/things/t1"))
            .and(query_param("timerel", "between"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": "t1", "type": "Room", "temperature": 21.5}
            })))
            .mount(&server)
            .await;

        let thing = upstream(&server)
            .get_thing(&ctx(), "t1", &QueryParams::parse("timerel=between"))
            .await
            .unwrap();

        assert_eq!(thing.type_values.temperature, Some(21.5));
    }

    #[tokio::test]
    async fn test_new_thing_splits_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/things"))
            .and(body_json(json!({
                "id": "t2",
                "type": "Container",
                "subType": "WasteContainer",
                "name": "Bin",
                "description": "",
                "location": {"latitude": 0.0, "longitude": 0.0},
                "tenant": "default"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        upstream(&server)
            .new_thing(
                &ctx(),
                NewThing {
                    id: "t2".to_string(),
                    thing_type: "Container-WasteContainer".to_string(),
                    sub_type: None,
                    name: "Bin".to_string(),
                    description: String::new(),
                    location: Location::default(),
                    tenant: "default".to_string(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reference_lists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/things/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": ["Sand", "North"]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v0/things/types"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"type": "Container", "subType": "WasteContainer", "name": "Container-WasteContainer"},
                         {"type": "Room", "name": "Room"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v0/things/values"))
            .and(query_param("thingid", "t1"))
            .and(query_param("latest", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let up = upstream(&server);
        assert_eq!(up.get_tags(&ctx()).await.unwrap(), vec!["Sand", "North"]);
        assert_eq!(
            up.get_types(&ctx()).await.unwrap(),
            vec!["Container-WasteContainer", "Room"]
        );
        assert!(up.get_latest_values(&ctx(), "t1").await.unwrap().is_empty());
    }
}
