use serde::Serialize;

/// Rows requested per page.
pub const PAGE_SIZE: u32 = 20;

pub const OPERATION_NAME: &str = "cruiseSearch_Cruises";

/// Search document. Selects only the fields the extractor reads.
pub const CRUISE_SEARCH_QUERY: &str = "query cruiseSearch_Cruises($filters: String, $qualifiers: String, $sort: CruiseSearchSort, $pagination: CruiseSearchPagination) { \
cruiseSearch(filters: $filters qualifiers: $qualifiers sort: $sort pagination: $pagination) { \
results { \
cruises { id \
masterSailing { itinerary { code departurePort { code name __typename } destination { code name __typename } ship { code name __typename } totalNights __typename } __typename } \
sailings { id itinerary { code __typename } sailDate stateroomClassPricing { price { value __typename } stateroomClass { id __typename } __typename } __typename } \
__typename } \
total __typename } \
__typename } }";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    Recommended,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sort {
    pub by: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub count: u32,
    pub skip: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchVariables {
    pub sort: Sort,
    pub pagination: Pagination,
}

/// Body of one upstream page request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub operation_name: &'static str,
    pub variables: SearchVariables,
    pub query: &'static str,
}

impl PageQuery {
    pub fn new(skip: u32, count: u32) -> Self {
        Self {
            operation_name: OPERATION_NAME,
            variables: SearchVariables {
                sort: Sort {
                    by: SortOrder::Recommended,
                },
                pagination: Pagination { count, skip },
            },
            query: CRUISE_SEARCH_QUERY,
        }
    }

    pub fn skip(&self) -> u32 {
        self.variables.pagination.skip
    }

    pub fn count(&self) -> u32 {
        self.variables.pagination.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(PageQuery::new(40, PAGE_SIZE)).unwrap();

        assert_eq!(body["operationName"], json!("cruiseSearch_Cruises"));
        assert_eq!(body["variables"]["sort"]["by"], json!("RECOMMENDED"));
        assert_eq!(body["variables"]["pagination"], json!({"count": 20, "skip": 40}));
        assert!(body["query"].as_str().unwrap().starts_with("query cruiseSearch_Cruises"));
    }
}
