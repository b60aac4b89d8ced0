use models::SourceFormat;
use utils::tabular::{normalize_header, RowNormalizer};

use blofin_parser::BlofinOrderHistoryParser;
use kraken_futures_parser::KrakenFuturesLogParser;
use kraken_spot_parser::KrakenSpotTradesParser;

use crate::ImportError;

/// Detection rules, checked in order. A format matches only when every one of
/// its signature columns is present.
const FORMAT_RULES: [(SourceFormat, &[&str]); 3] = [
    (SourceFormat::FormatAOrderHistory, &blofin_parser::SIGNATURE),
    (SourceFormat::FormatBSpotTrades, &kraken_spot_parser::SIGNATURE),
    (SourceFormat::FormatBFuturesLog, &kraken_futures_parser::SIGNATURE),
];

/// Classifies a header row. Matching ignores case, surrounding whitespace and a
/// leading BOM; column order is irrelevant.
pub fn detect_format(headers: &[String]) -> SourceFormat {
    let present: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    FORMAT_RULES
        .iter()
        .find(|(_, signature)| signature.iter().all(|col| present.iter().any(|h| h == col)))
        .map(|(format, _)| *format)
        .unwrap_or(SourceFormat::Unknown)
}

/// Builds the normalizer for a detected format.
pub fn normalizer_for(
    format: SourceFormat,
    headers: &[String],
) -> Result<Box<dyn RowNormalizer>, ImportError> {
    let build = |e: anyhow::Error| ImportError::Parse(format!("{:#}", e));
    match format {
        SourceFormat::FormatAOrderHistory => Ok(Box::new(
            BlofinOrderHistoryParser::from_headers(headers).map_err(build)?,
        )),
        SourceFormat::FormatBSpotTrades => Ok(Box::new(
            KrakenSpotTradesParser::from_headers(headers).map_err(build)?,
        )),
        SourceFormat::FormatBFuturesLog => Ok(Box::new(
            KrakenFuturesLogParser::from_headers(headers).map_err(build)?,
        )),
        SourceFormat::RemoteSnapshot | SourceFormat::Unknown => Err(ImportError::UnknownFormat {
            headers: headers.to_vec(),
        }),
    }
}
