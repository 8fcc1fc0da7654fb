//! Page extractors
//!
//! Pure functions mapping fetched page text to catalog, listing and detail
//! data. Nothing here performs I/O; a missing structure is reported as
//! `HarvestError::Parse`.

use crate::config::SiteConfig;
use crate::crawler::model::{ArticleDetail, ListingRow};
use crate::HarvestError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

const CATEGORY_TILE: &str = "div.w3-col.l4.m6.s6";
const LISTING_TABLE: &str = "table.table1";
const MESSAGE_BLOCK: &str = "div.msg";
const BYLINE_ITEM: &str = "div.w3-bar-item.w3-padding-0";

/// Positions of the byline items holding the id and the two `name, date` pairs
const ID_ITEM: usize = 0;
const QUESTION_ITEM: usize = 3;
const ANSWER_ITEM: usize = 5;

/// Ordered cell schema of a listing row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    PatientName,
    DoctorName,
    Satisfactory,
    Rating,
    Views,
    Title,
}

impl Column {
    const ALL: [Column; 7] = [
        Column::Date,
        Column::PatientName,
        Column::DoctorName,
        Column::Satisfactory,
        Column::Rating,
        Column::Views,
        Column::Title,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::PatientName => "patient_name",
            Column::DoctorName => "doctor_name",
            Column::Satisfactory => "satisfactory",
            Column::Rating => "rating",
            Column::Views => "views",
            Column::Title => "title",
        }
    }
}

/// A listing row that could not be mapped onto the column schema
#[derive(Debug)]
pub struct RejectedRow {
    /// Zero-based row index below the header row
    pub index: usize,
    pub error: HarvestError,
}

/// Rows of one listing page
#[derive(Debug, Default)]
pub struct ListingPage {
    /// Accepted rows in source order
    pub rows: Vec<ListingRow>,
    pub rejected: Vec<RejectedRow>,
}

fn selector(css: &'static str) -> Result<Selector, HarvestError> {
    Selector::parse(css).map_err(|e| HarvestError::parse(format!("bad selector {}: {:?}", css, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Normalizes a category tile label into a collection-safe name
pub fn clean_category_name(raw: &str) -> String {
    raw.replace('\u{3000}', "").trim().to_string()
}

/// Finds every category tile on the index page
///
/// Returns `(name, listing_path)` pairs in page order. Tiles without a link
/// or with an empty label are skipped, and a repeated name keeps its first
/// occurrence so collection names stay unique.
///
/// # Errors
///
/// `HarvestError::Parse` when the page holds no usable tile.
pub fn parse_category_tiles(
    html: &str,
    site: &SiteConfig,
) -> Result<Vec<(String, String)>, HarvestError> {
    let document = Html::parse_document(html);
    let tile_selector = selector(CATEGORY_TILE)?;
    let anchor_selector = selector("a")?;

    let mut seen = HashSet::new();
    let mut tiles = Vec::new();

    for tile in document.select(&tile_selector) {
        let Some(anchor) = tile.select(&anchor_selector).next() else {
            continue;
        };

        let name = clean_category_name(&anchor.text().collect::<String>());
        if name.is_empty() {
            continue;
        }

        if !seen.insert(name.clone()) {
            tracing::warn!("Duplicate category '{}' on index page, keeping the first", name);
            continue;
        }

        let listing_path = site.listing_path(&name);
        tiles.push((name, listing_path));
    }

    if tiles.is_empty() {
        return Err(HarvestError::parse("no category tiles found on index page"));
    }

    Ok(tiles)
}

/// Reads the page count from a listing's pagination control
///
/// The last `<option>` holds the highest page number. Returns `None` when
/// there is no option or its text is not a positive integer.
pub fn parse_page_count(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    let option_selector = Selector::parse("option").ok()?;

    document
        .select(&option_selector)
        .last()
        .and_then(|option| element_text(option).parse::<u32>().ok())
        .filter(|count| *count > 0)
}

/// Extracts the rows of one listing page
///
/// The listing table is serialized, `&lt;`/`&gt;` entities are decoded and
/// the result is parsed again so markup escaped inside cells becomes real
/// elements. The header row is skipped and every other row is mapped onto
/// the column schema; rows that do not fit are returned as rejected.
///
/// # Errors
///
/// `HarvestError::Parse` when the page has no listing table.
pub fn extract_listing(html: &str, detail_prefix: &str) -> Result<ListingPage, HarvestError> {
    let document = Html::parse_document(html);
    let table_selector = selector(LISTING_TABLE)?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| HarvestError::parse("listing table not found"))?;

    let decoded = table.html().replace("&lt;", "<").replace("&gt;", ">");
    let fragment = Html::parse_fragment(&decoded);

    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;
    let anchor_selector = selector("a")?;

    let mut page = ListingPage::default();
    for (index, row) in fragment.select(&row_selector).skip(1).enumerate() {
        match parse_row(row, &cell_selector, &anchor_selector, detail_prefix) {
            Ok(listing_row) => page.rows.push(listing_row),
            Err(error) => page.rejected.push(RejectedRow { index, error }),
        }
    }

    Ok(page)
}

fn parse_row(
    row: ElementRef<'_>,
    cell_selector: &Selector,
    anchor_selector: &Selector,
    detail_prefix: &str,
) -> Result<ListingRow, HarvestError> {
    let cells: Vec<ElementRef<'_>> = row.select(cell_selector).collect();
    if cells.len() != Column::ALL.len() {
        return Err(HarvestError::parse(format!(
            "expected {} cells, found {}",
            Column::ALL.len(),
            cells.len()
        )));
    }

    let text = |column: Column| element_text(cells[column.index()]);

    let href = cells[Column::Title.index()]
        .select(anchor_selector)
        .next()
        .and_then(|anchor| anchor.value().attr("href"))
        .ok_or_else(|| HarvestError::parse("title cell has no link"))?;

    Ok(ListingRow {
        date: text(Column::Date),
        patient_name: text(Column::PatientName),
        doctor_name: text(Column::DoctorName),
        satisfactory: parse_score(Column::Satisfactory, &text(Column::Satisfactory))?,
        rating: parse_score(Column::Rating, &text(Column::Rating))?,
        views: parse_count(Column::Views, &text(Column::Views))?,
        title: text(Column::Title),
        detail_path: format!("{}{}", detail_prefix, href),
    })
}

/// Blank score cells mean "no score", not zero
fn parse_score(column: Column, value: &str) -> Result<Option<f64>, HarvestError> {
    if value.is_empty() {
        return Ok(None);
    }
    value.parse::<f64>().map(Some).map_err(|e| {
        HarvestError::parse(format!("{} cell '{}' is not a number: {}", column.name(), value, e))
    })
}

fn parse_count(column: Column, value: &str) -> Result<u64, HarvestError> {
    if value.is_empty() {
        return Ok(0);
    }
    value.parse::<u64>().map_err(|e| {
        HarvestError::parse(format!("{} cell '{}' is not a count: {}", column.name(), value, e))
    })
}

/// Extracts the fields of an article detail page
///
/// # Errors
///
/// `HarvestError::Parse` unless the page has exactly two message blocks, a
/// numeric id and both `name, date` bylines.
pub fn extract_detail(html: &str) -> Result<ArticleDetail, HarvestError> {
    let document = Html::parse_document(html);

    let messages: Vec<String> = document
        .select(&selector(MESSAGE_BLOCK)?)
        .map(element_text)
        .collect();
    let [question_body, answer_body]: [String; 2] = messages.try_into().map_err(|m: Vec<String>| {
        HarvestError::parse(format!("expected 2 message blocks, found {}", m.len()))
    })?;

    let bylines: Vec<String> = document
        .select(&selector(BYLINE_ITEM)?)
        .map(element_text)
        .collect();
    if bylines.len() <= ANSWER_ITEM {
        return Err(HarvestError::parse(format!(
            "expected at least {} byline items, found {}",
            ANSWER_ITEM + 1,
            bylines.len()
        )));
    }

    let id = parse_article_id(&bylines[ID_ITEM])?;
    let (question_author, question_date) = split_byline(&bylines[QUESTION_ITEM])?;
    let (answer_author, answer_date) = split_byline(&bylines[ANSWER_ITEM])?;

    Ok(ArticleDetail {
        id,
        question_author,
        question_date,
        answer_author,
        answer_date,
        question_body,
        answer_body,
    })
}

/// Parses an id such as `#12345`, ignoring the leading marker
fn parse_article_id(text: &str) -> Result<i64, HarvestError> {
    let digits = text.trim_start_matches(|c: char| !c.is_ascii_digit()).trim();
    digits
        .parse::<i64>()
        .map_err(|_| HarvestError::parse(format!("unparsable article id '{}'", text)))
}

/// Splits `name, date` at the last comma
///
/// The date ends at the first non-breaking space; anything after it is
/// trailing decoration.
fn split_byline(text: &str) -> Result<(String, String), HarvestError> {
    let comma = text
        .rfind(',')
        .ok_or_else(|| HarvestError::parse(format!("byline '{}' has no 'name, date' pair", text)))?;

    let name = text[..comma].trim().to_string();
    let date = text[comma + 1..]
        .trim()
        .split('\u{a0}')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    if date.is_empty() {
        return Err(HarvestError::parse(format!("byline '{}' has no date", text)));
    }

    Ok((name, date))
}
