//! View models handed to the renderer, and the composers that build them
//! from one or more upstream calls.

pub mod home;
pub mod sensors;
pub mod things;

use crate::paging::{offset_and_limit, page_index, sanitize_params, Paging, QueryParams};

/// Element id the pager swaps its table into.
pub const TABLE_TARGET: &str = "#tableview";

/// Map views list everything on one page.
const MAP_LIMIT: u64 = 1000;

/// `mapview` is view state, not an upstream filter. Pager links only render
/// in list view, which is also what a link without `mapview` opens.
const PAGING_KEYS: [&str; 4] = ["mapview", "page", "limit", "offset"];

/// Paging and filter input of a list request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub offset: u64,
    pub limit: u64,
    pub page_index: u64,
    pub map_view: bool,
    /// Remaining query, forwarded upstream and kept in pager links.
    pub filters: QueryParams,
}

impl ListRequest {
    pub fn from_query(query: &QueryParams) -> Self {
        let (offset, limit) = offset_and_limit(query);
        let page_index = page_index(query, offset, limit);

        let mut filters = query.clone();
        sanitize_params(&mut filters, &PAGING_KEYS);

        ListRequest {
            offset,
            limit,
            page_index,
            map_view: query.get("mapview") == Some("true"),
            filters,
        }
    }

    /// Widens the page to everything when the map is shown.
    pub fn for_map(mut self) -> Self {
        if self.map_view {
            self.offset = 0;
            self.limit = MAP_LIMIT;
            self.page_index = 1;
        }
        self
    }

    pub fn paging(&self, count: usize, total: u64, target_url: &str) -> Paging {
        Paging::new(
            self.page_index,
            self.limit,
            self.offset,
            count,
            total,
            &self.filters,
            target_url,
            TABLE_TARGET,
        )
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::client::{Upstream, UpstreamClient};
    use crate::config::Upstreams;
    use std::time::Duration;
    use wiremock::MockServer;

    pub fn upstream(server: &MockServer) -> Upstream {
        Upstream::new(
            UpstreamClient::new(Duration::from_secs(5)).unwrap(),
            Upstreams::with_base(&server.uri()),
        )
    }
}
