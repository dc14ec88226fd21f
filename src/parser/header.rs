//! Header resolution: map CUR column names to the fields the parser needs.
//!
//! Matching is case-insensitive and ignores spaces and underscores. Exact
//! alias matches win over substring matches; within each pass aliases are
//! tried in order.

use crate::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    ProductCode,
    ResourceId,
    UsageType,
    Cost,
    InstanceType,
    OperatingSystem,
    Region,
    UsageAmount,
    StartDate,
    EndDate,
    LineItemType,
}

impl Column {
    pub const ALL: [Column; 11] = [
        Column::ProductCode,
        Column::ResourceId,
        Column::UsageType,
        Column::Cost,
        Column::InstanceType,
        Column::OperatingSystem,
        Column::Region,
        Column::UsageAmount,
        Column::StartDate,
        Column::EndDate,
        Column::LineItemType,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::ProductCode => "product code",
            Column::ResourceId => "resource id",
            Column::UsageType => "usage type",
            Column::Cost => "cost",
            Column::InstanceType => "instance type",
            Column::OperatingSystem => "operating system",
            Column::Region => "region",
            Column::UsageAmount => "usage amount",
            Column::StartDate => "usage start date",
            Column::EndDate => "usage end date",
            Column::LineItemType => "line item type",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::ProductCode => &[
                "lineitem/productcode",
                "lineitemproductcode",
                "product/productcode",
                "productcode",
                "servicecode",
                "service",
            ],
            Column::ResourceId => &[
                "lineitem/resourceid",
                "lineitemresourceid",
                "resourceid",
                "resource",
            ],
            Column::UsageType => &["lineitem/usagetype", "lineitemusagetype", "usagetype"],
            Column::Cost => &[
                "lineitem/unblendedcost",
                "lineitemunblendedcost",
                "unblendedcost",
                "blendedcost",
                "netcost",
                "cost",
                "charges",
            ],
            Column::InstanceType => &["product/instancetype", "instancetype"],
            Column::OperatingSystem => &["product/operatingsystem", "operatingsystem", "platform"],
            Column::Region => &[
                "product/region",
                "productregioncode",
                "product/regioncode",
                "region",
                "availabilityzone",
                "location",
            ],
            Column::UsageAmount => &[
                "lineitem/usageamount",
                "usageamount",
                "usagequantity",
                "quantity",
            ],
            Column::StartDate => &[
                "lineitem/usagestartdate",
                "usagestartdate",
                "startdate",
                "starttime",
            ],
            Column::EndDate => &[
                "lineitem/usageenddate",
                "usageenddate",
                "enddate",
                "endtime",
            ],
            Column::LineItemType => &["lineitem/lineitemtype", "lineitemtype", "chargetype"],
        }
    }

    /// Headers that contain an alias but describe something else, such as
    /// the source and destination regions of a data transfer.
    fn rejects(self) -> &'static [&'static str] {
        match self {
            Column::Region => &["fromregion", "toregion", "fromlocation", "tolocation"],
            _ => &[],
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

fn normalize(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .trim_matches('"')
        .chars()
        .filter(|c| !matches!(c, ' ' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Positional index of each resolved column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    indices: [Option<usize>; Column::ALL.len()],
}

impl ColumnMap {
    /// Resolve columns from header fields. Only the cost column is required.
    pub fn resolve(headers: &[String]) -> Result<Self, IngestError> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize(h)).collect();
        let mut indices = [None; Column::ALL.len()];

        for column in Column::ALL {
            indices[column.slot()] = find_column(&normalized, column.aliases(), column.rejects());
        }

        if indices[Column::Cost.slot()].is_none() {
            return Err(IngestError::MissingColumn {
                column: Column::Cost.name(),
                aliases: Column::Cost.aliases().join(", "),
            });
        }

        Ok(Self { indices })
    }

    pub fn index(&self, column: Column) -> Option<usize> {
        self.indices[column.slot()]
    }

    /// Raw field value for a column; empty when unresolved or out of range.
    pub fn get<'f>(&self, fields: &'f [String], column: Column) -> &'f str {
        self.index(column)
            .and_then(|i| fields.get(i))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    pub fn missing(&self) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|c| self.index(*c).is_none())
            .collect()
    }
}

fn find_column(headers: &[String], aliases: &[&str], rejects: &[&str]) -> Option<usize> {
    for alias in aliases {
        if let Some(pos) = headers.iter().position(|h| h == alias) {
            return Some(pos);
        }
    }
    let accepted = |h: &String| !rejects.iter().any(|r| h.contains(r));
    for alias in aliases {
        if let Some(pos) = headers
            .iter()
            .position(|h| h.contains(alias) && accepted(h))
        {
            return Some(pos);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(line: &str) -> Vec<String> {
        line.split(',').map(str::to_string).collect()
    }

    #[test]
    fn test_resolve_cur_header() {
        let map = ColumnMap::resolve(&headers(
            "identity/LineItemId,lineItem/UsageStartDate,lineItem/UsageEndDate,lineItem/ProductCode,\
             lineItem/UsageType,lineItem/ResourceId,lineItem/UsageAmount,lineItem/UnblendedCost,\
             product/instanceType,product/operatingSystem,product/region,lineItem/LineItemType",
        ))
        .unwrap();

        assert_eq!(map.index(Column::StartDate), Some(1));
        assert_eq!(map.index(Column::EndDate), Some(2));
        assert_eq!(map.index(Column::ProductCode), Some(3));
        assert_eq!(map.index(Column::UsageType), Some(4));
        assert_eq!(map.index(Column::ResourceId), Some(5));
        assert_eq!(map.index(Column::UsageAmount), Some(6));
        assert_eq!(map.index(Column::Cost), Some(7));
        assert_eq!(map.index(Column::InstanceType), Some(8));
        assert_eq!(map.index(Column::OperatingSystem), Some(9));
        assert_eq!(map.index(Column::Region), Some(10));
        assert_eq!(map.index(Column::LineItemType), Some(11));
        assert!(map.missing().is_empty());
    }

    #[test]
    fn test_resolve_simple_header_with_spaces() {
        let map = ColumnMap::resolve(&headers("Service,Resource ID,Region,Cost,Usage Type")).unwrap();
        assert_eq!(map.index(Column::ProductCode), Some(0));
        assert_eq!(map.index(Column::ResourceId), Some(1));
        assert_eq!(map.index(Column::Region), Some(2));
        assert_eq!(map.index(Column::Cost), Some(3));
        assert_eq!(map.index(Column::UsageType), Some(4));
        assert_eq!(map.index(Column::InstanceType), None);
    }

    #[test]
    fn test_exact_match_beats_substring() {
        let map = ColumnMap::resolve(&headers("lineItem/NetUnblendedCost,lineItem/UnblendedCost")).unwrap();
        assert_eq!(map.index(Column::Cost), Some(1));
    }

    #[test]
    fn test_resolve_snake_case_header() {
        let map = ColumnMap::resolve(&headers(
            "line_item_line_item_type,line_item_product_code,line_item_resource_id,\
             line_item_net_unblended_cost,line_item_unblended_cost,product_from_location,\
             product_from_region_code,product_region_code,product_to_region_code",
        ))
        .unwrap();

        assert_eq!(map.index(Column::LineItemType), Some(0));
        assert_eq!(map.index(Column::ProductCode), Some(1));
        assert_eq!(map.index(Column::ResourceId), Some(2));
        assert_eq!(map.index(Column::Cost), Some(4));
        assert_eq!(map.index(Column::Region), Some(7));
    }

    #[test]
    fn test_transfer_region_columns_are_not_the_region() {
        let map = ColumnMap::resolve(&headers("Cost,product_from_region_code,product_to_region_code")).unwrap();
        assert_eq!(map.index(Column::Region), None);
    }

    #[test]
    fn test_missing_cost_column_is_fatal() {
        let err = ColumnMap::resolve(&headers("lineItem/ProductCode,product/region")).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn { column: "cost", .. }));
    }

    #[test]
    fn test_bom_and_quotes_are_ignored() {
        let map = ColumnMap::resolve(&headers("\u{feff}\"Service\",\"Cost\"")).unwrap();
        assert_eq!(map.index(Column::ProductCode), Some(0));
        assert_eq!(map.index(Column::Cost), Some(1));
    }

    #[test]
    fn test_get_trims_and_tolerates_short_rows() {
        let map = ColumnMap::resolve(&headers("Service,Cost,Region")).unwrap();
        let fields = vec![" EC2 ".to_string(), "1.5".to_string()];
        assert_eq!(map.get(&fields, Column::ProductCode), "EC2");
        assert_eq!(map.get(&fields, Column::Region), "");
    }
}
