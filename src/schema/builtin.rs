//! Built-in GTFS static tables.
//!
//! Declared as plain data so the base registry can be built without any
//! fallible parsing step.

use super::{ColumnType, ParentRelation, TableSchema};
use ColumnType::{Boolean, Date, Decimal, Duration, Integer, Text};

/// Name of the synthetic service table every calendar-bearing table hangs off.
pub const SERVICES_TABLE: &str = "services";

struct BuiltinTable {
    name: &'static str,
    columns: &'static [(&'static str, ColumnType)],
    primary_key: &'static [&'static str],
    parents: &'static [(&'static str, &'static [(&'static str, &'static str)])],
    seed: bool,
}

const SERVICE_JOIN: &[(&str, &str)] = &[("service_id", "service_id")];

const TABLES: &[BuiltinTable] = &[
    BuiltinTable {
        name: SERVICES_TABLE,
        columns: &[("service_id", Text)],
        primary_key: &["service_id"],
        parents: &[],
        seed: true,
    },
    BuiltinTable {
        name: "agency.txt",
        columns: &[
            ("agency_id", Text),
            ("agency_name", Text),
            ("agency_url", Text),
            ("agency_timezone", Text),
            ("agency_lang", Text),
            ("agency_phone", Text),
            ("agency_fare_url", Text),
            ("agency_email", Text),
        ],
        primary_key: &[],
        parents: &[],
        seed: false,
    },
    BuiltinTable {
        name: "stops.txt",
        columns: &[
            ("stop_id", Text),
            ("stop_code", Text),
            ("stop_name", Text),
            ("stop_desc", Text),
            ("stop_lat", Decimal),
            ("stop_lon", Decimal),
            ("zone_id", Text),
            ("stop_url", Text),
            ("location_type", Text),
            ("parent_station", Text),
            ("stop_timezone", Text),
            ("wheelchair_boarding", Text),
        ],
        primary_key: &["stop_id"],
        parents: &[],
        seed: false,
    },
    BuiltinTable {
        name: "routes.txt",
        columns: &[
            ("route_id", Text),
            ("agency_id", Text),
            ("route_short_name", Text),
            ("route_long_name", Text),
            ("route_desc", Text),
            ("route_type", Text),
            ("route_url", Text),
            ("route_color", Text),
            ("route_text_color", Text),
            ("route_sort_order", Integer),
        ],
        primary_key: &["route_id"],
        parents: &[("agency.txt", &[("agency_id", "agency_id")])],
        seed: false,
    },
    BuiltinTable {
        name: "calendar.txt",
        columns: &[
            ("service_id", Text),
            ("monday", Boolean),
            ("tuesday", Boolean),
            ("wednesday", Boolean),
            ("thursday", Boolean),
            ("friday", Boolean),
            ("saturday", Boolean),
            ("sunday", Boolean),
            ("start_date", Date),
            ("end_date", Date),
        ],
        primary_key: &["service_id"],
        parents: &[(SERVICES_TABLE, SERVICE_JOIN)],
        seed: false,
    },
    BuiltinTable {
        name: "calendar_dates.txt",
        columns: &[
            ("service_id", Text),
            ("date", Date),
            ("exception_type", Text),
        ],
        primary_key: &["service_id", "date"],
        parents: &[(SERVICES_TABLE, SERVICE_JOIN)],
        seed: false,
    },
    BuiltinTable {
        name: "shapes.txt",
        columns: &[
            ("shape_id", Text),
            ("shape_pt_lat", Decimal),
            ("shape_pt_lon", Decimal),
            ("shape_pt_sequence", Integer),
            ("shape_dist_traveled", Decimal),
        ],
        primary_key: &["shape_id", "shape_pt_sequence"],
        parents: &[],
        seed: false,
    },
    BuiltinTable {
        name: "trips.txt",
        columns: &[
            ("route_id", Text),
            ("service_id", Text),
            ("trip_id", Text),
            ("trip_headsign", Text),
            ("trip_short_name", Text),
            ("direction_id", Text),
            ("block_id", Text),
            ("shape_id", Text),
            ("wheelchair_accessible", Text),
            ("bikes_allowed", Text),
        ],
        primary_key: &["trip_id"],
        parents: &[
            ("routes.txt", &[("route_id", "route_id")]),
            (SERVICES_TABLE, SERVICE_JOIN),
        ],
        seed: false,
    },
    BuiltinTable {
        name: "stop_times.txt",
        columns: &[
            ("trip_id", Text),
            ("arrival_time", Duration),
            ("departure_time", Duration),
            ("stop_id", Text),
            ("stop_sequence", Integer),
            ("stop_headsign", Text),
            ("pickup_type", Text),
            ("drop_off_type", Text),
            ("shape_dist_traveled", Decimal),
            ("timepoint", Text),
        ],
        primary_key: &["trip_id", "stop_sequence"],
        parents: &[
            ("trips.txt", &[("trip_id", "trip_id")]),
            ("stops.txt", &[("stop_id", "stop_id")]),
        ],
        seed: false,
    },
    BuiltinTable {
        name: "frequencies.txt",
        columns: &[
            ("trip_id", Text),
            ("start_time", Duration),
            ("end_time", Duration),
            ("headway_secs", Integer),
            ("exact_times", Text),
        ],
        primary_key: &["trip_id", "start_time"],
        parents: &[("trips.txt", &[("trip_id", "trip_id")])],
        seed: false,
    },
    BuiltinTable {
        name: "fare_attributes.txt",
        columns: &[
            ("fare_id", Text),
            ("price", Decimal),
            ("currency_type", Text),
            ("payment_method", Text),
            ("transfers", Text),
            ("agency_id", Text),
            ("transfer_duration", Integer),
        ],
        primary_key: &["fare_id"],
        parents: &[],
        seed: false,
    },
    BuiltinTable {
        name: "fare_rules.txt",
        columns: &[
            ("fare_id", Text),
            ("route_id", Text),
            ("origin_id", Text),
            ("destination_id", Text),
            ("contains_id", Text),
        ],
        primary_key: &[],
        parents: &[
            ("fare_attributes.txt", &[("fare_id", "fare_id")]),
            ("routes.txt", &[("route_id", "route_id")]),
        ],
        seed: false,
    },
    BuiltinTable {
        name: "transfers.txt",
        columns: &[
            ("from_stop_id", Text),
            ("to_stop_id", Text),
            ("transfer_type", Text),
            ("min_transfer_time", Integer),
        ],
        primary_key: &[],
        parents: &[("stops.txt", &[("from_stop_id", "stop_id")])],
        seed: false,
    },
    BuiltinTable {
        name: "feed_info.txt",
        columns: &[
            ("feed_publisher_name", Text),
            ("feed_publisher_url", Text),
            ("feed_lang", Text),
            ("feed_start_date", Date),
            ("feed_end_date", Date),
            ("feed_version", Text),
            ("feed_contact_email", Text),
            ("feed_contact_url", Text),
        ],
        primary_key: &[],
        parents: &[],
        seed: false,
    },
];

/// Builds the built-in table definitions in declaration order.
pub(crate) fn tables() -> Vec<TableSchema> {
    TABLES.iter().map(to_schema).collect()
}

fn to_schema(table: &BuiltinTable) -> TableSchema {
    let mut schema = TableSchema::new(table.name).with_primary_key(table.primary_key.iter().copied());
    for (name, kind) in table.columns {
        schema = schema.with_column(*name, *kind);
    }
    for (parent, columns) in table.parents {
        schema = schema.with_parent(ParentRelation::new(*parent, columns.iter().copied()));
    }
    if table.seed {
        schema.seed = true;
        schema.exclude_from_data_export = true;
        schema.exclude_from_schema_export = true;
    }
    schema.built_in = true;
    schema
}
