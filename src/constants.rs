// Defaults matching the layout of the Scottish Government domestic EPC extracts.
// Every value here can be overridden through `Config`.

pub const DEFAULT_INPUT_DIR: &str = "raw-input";
pub const DEFAULT_OUTPUT_DIR: &str = "formatted-output";
pub const DEFAULT_PARTITION_SUBDIR: &str = "by-local-authority";
pub const DEFAULT_LOG_DIR: &str = "logs";

pub const DEFAULT_CONFIG_FILE: &str = "epc_processor.toml";
pub const CONFIG_ENV_VAR: &str = "EPC_CONFIG";

pub const DEFAULT_EXTENSION: &str = "csv";

pub const DEFAULT_CONSOLIDATED_FILENAME: &str = "Energy Efficiency Data - All Local Authorities.csv";
pub const DEFAULT_PARTITION_TEMPLATE: &str = "{label} - Energy Efficiency Data.csv";
pub const LABEL_PLACEHOLDER: &str = "{label}";

/// Label used for records whose jurisdiction is empty.
pub const UNCATEGORISED: &str = "Uncategorised";

pub const DEFAULT_ID_COLUMN: &str = "Property_UPRN";

/// Year followed by a quarter, e.g. `2022Q1`.
pub const DEFAULT_PERIOD_PATTERN: &str = r"(?P<period>\d{4}Q[1-4])";

pub const BYTE_ORDER_MARK: char = '\u{feff}';

/// Local authority must stay first: partitioning reads it from position 0.
pub const DEFAULT_EXPORT_COLUMNS: &[&str] = &[
    "Local Authority",
    "Property_UPRN",
    "OSG_UPRN",
    "ADDRESS1",
    "ADDRESS2",
    "POST_TOWN",
    "Postcode",
    "Tenure",
    "Property Type",
    "Date of Assessment",
    "Date of Certificate",
    "Current energy efficiency rating",
    "Current energy efficiency rating band",
    "Potential Energy Efficiency Rating",
    "Potential energy efficiency rating band",
    "Current Environmental Impact Rating",
    "Current Environmental Impact Rating Band",
    "Potential Environmental Impact Rating",
    "Potential Environmental Impact Rating Band",
    "CO2 Emissions Current Per Floor Area (kg.CO2/m²/yr)",
    "Improvements",
    "Ward Code",
    "Ward Name",
    "Data Zone 2011",
];

/// Strip a leading UTF-8 byte-order marker from a header or column name.
pub fn strip_bom(name: &str) -> &str {
    name.strip_prefix(BYTE_ORDER_MARK).unwrap_or(name)
}
