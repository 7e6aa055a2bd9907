//! Book detail pages
//!
//! Identifier, title, price and image are required: if any is missing the
//! page yields a `ParseError` and no record. Rating and availability are
//! tolerant and fall back to 0.

use regex::Regex;
use scraper::{Html, Selector};

use crate::config::CatalogSelectors;
use crate::error::{CrawlError, ParseError, RecordField};
use crate::models::{BookRecord, DetailRef};

use super::{compile, first_text, resolve};

pub struct DetailParser {
    identifier: Selector,
    title: Selector,
    price: Selector,
    rating: Selector,
    availability: Selector,
    availability_pattern: Regex,
    image: Selector,
    any_image: Selector,
}

impl DetailParser {
    pub fn new(selectors: &CatalogSelectors) -> Result<Self, CrawlError> {
        let availability_pattern =
            Regex::new(&selectors.availability_pattern).map_err(|source| {
                CrawlError::InvalidPattern {
                    pattern: selectors.availability_pattern.clone(),
                    source,
                }
            })?;

        Ok(Self {
            identifier: compile(&selectors.identifier)?,
            title: compile(&selectors.title)?,
            price: compile(&selectors.price)?,
            rating: compile(&selectors.rating)?,
            availability: compile(&selectors.availability)?,
            availability_pattern,
            image: compile(&selectors.image)?,
            any_image: compile("img")?,
        })
    }

    pub fn parse(&self, html: &str, detail: &DetailRef) -> Result<BookRecord, ParseError> {
        let url = detail.url.as_str();
        let document = Html::parse_document(html);

        let identifier = first_text(&document, &self.identifier)
            .ok_or_else(|| ParseError::missing(url, RecordField::Identifier))?;

        let title = first_text(&document, &self.title)
            .ok_or_else(|| ParseError::missing(url, RecordField::Title))?;

        let price_text = first_text(&document, &self.price)
            .ok_or_else(|| ParseError::missing(url, RecordField::Price))?;
        let price = parse_price(&price_text).ok_or_else(|| {
            ParseError::malformed(url, RecordField::Price, format!("not a price: {price_text:?}"))
        })?;

        let rating = document
            .select(&self.rating)
            .next()
            .and_then(|el| el.value().attr("class"))
            .and_then(|class| class.split_whitespace().nth(1).map(rating_from_label))
            .unwrap_or(0);

        let availability = first_text(&document, &self.availability)
            .and_then(|text| self.stock_count(&text))
            .unwrap_or(0);

        let src = document
            .select(&self.image)
            .next()
            .or_else(|| document.select(&self.any_image).next())
            .and_then(|img| img.value().attr("src"))
            .filter(|src| !src.trim().is_empty())
            .ok_or_else(|| ParseError::missing(url, RecordField::ImageUrl))?;
        let image_url = resolve(&detail.url, src).ok_or_else(|| {
            ParseError::malformed(url, RecordField::ImageUrl, format!("unresolvable src {src:?}"))
        })?;

        Ok(BookRecord {
            identifier,
            title,
            category: detail.category.clone(),
            price,
            rating,
            availability,
            image_url: image_url.to_string(),
        })
    }

    fn stock_count(&self, text: &str) -> Option<u32> {
        self.availability_pattern
            .captures(text)?
            .get(1)?
            .as_str()
            .parse()
            .ok()
    }
}

/// Maps a star-rating label to 1..=5; anything else is 0.
pub fn rating_from_label(label: &str) -> u8 {
    match label {
        "One" => 1,
        "Two" => 2,
        "Three" => 3,
        "Four" => 4,
        "Five" => 5,
        _ => 0,
    }
}

/// Parses "£51.77" style text. Any currency prefix is stripped; signs and
/// a leading decimal point are kept so they reach the number parser.
pub fn parse_price(text: &str) -> Option<f64> {
    let number = text
        .trim()
        .trim_start_matches(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '+' | '-')))
        .trim_end();
    let price: f64 = number.parse().ok()?;
    (price.is_finite() && price >= 0.0).then_some(price)
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    const DETAIL: &str = r#"<html><body>
      <div class="row">
        <div class="col-sm-6">
          <div id="product_gallery" class="carousel">
            <div class="item active"><img src="../../media/cache/fe/72/fe72f0532301ec28892ae79a629a293c.jpg" alt="A Light in the Attic"></div>
          </div>
        </div>
        <div class="col-sm-6 product_main">
          <h1>A Light in the Attic</h1>
          <p class="price_color">£51.77</p>
          <p class="instock availability">
            <i class="icon-ok"></i>
            In stock (22 available)
          </p>
          <p class="star-rating Three"><i class="icon-star"></i></p>
        </div>
      </div>
      <table class="table table-striped">
        <tr><th>UPC</th><td>a897fe39b1053632</td></tr>
        <tr><th>Product Type</th><td>Books</td></tr>
      </table>
    </body></html>"#;

    fn detail_ref() -> DetailRef {
        DetailRef {
            url: Url::parse("https://books.toscrape.com/catalogue/a-light-in-the-attic_1000/index.html")
                .unwrap(),
            category: "poetry".to_string(),
        }
    }

    fn parser() -> DetailParser {
        DetailParser::new(&CatalogSelectors::default()).unwrap()
    }

    #[test]
    fn extracts_all_fields() {
        let record = parser().parse(DETAIL, &detail_ref()).unwrap();

        assert_eq!(
            record,
            BookRecord {
                identifier: "a897fe39b1053632".to_string(),
                title: "A Light in the Attic".to_string(),
                category: "poetry".to_string(),
                price: 51.77,
                rating: 3,
                availability: 22,
                image_url:
                    "https://books.toscrape.com/media/cache/fe/72/fe72f0532301ec28892ae79a629a293c.jpg"
                        .to_string(),
            }
        );
    }

    #[test]
    fn parsing_is_idempotent() {
        let parser = parser();
        let first = parser.parse(DETAIL, &detail_ref()).unwrap();
        let second = parser.parse(DETAIL, &detail_ref()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.price.to_bits(), second.price.to_bits());
    }

    #[test]
    fn rating_labels() {
        let labels = ["One", "Two", "Three", "Four", "Five"];
        for (expected, label) in (1..=5).zip(labels) {
            assert_eq!(rating_from_label(label), expected);
        }
        assert_eq!(rating_from_label("Zero"), 0);
        assert_eq!(rating_from_label("five"), 0);
        assert_eq!(rating_from_label(""), 0);
    }

    #[test]
    fn unknown_rating_does_not_fail_the_record() {
        let html = DETAIL.replace("star-rating Three", "star-rating Six");
        assert_eq!(parser().parse(&html, &detail_ref()).unwrap().rating, 0);

        let html = DETAIL.replace("star-rating Three", "star-rating");
        assert_eq!(parser().parse(&html, &detail_ref()).unwrap().rating, 0);
    }

    #[test]
    fn missing_stock_count_defaults_to_zero() {
        let html = DETAIL.replace("In stock (22 available)", "Out of stock");
        assert_eq!(parser().parse(&html, &detail_ref()).unwrap().availability, 0);
    }

    #[test]
    fn missing_price_fails_the_record() {
        let html = DETAIL.replace(r#"<p class="price_color">£51.77</p>"#, "");
        let err = parser().parse(&html, &detail_ref()).unwrap_err();

        assert_eq!(err.field, RecordField::Price);
        assert_eq!(err.url, detail_ref().url.as_str());
    }

    #[test]
    fn malformed_price_fails_the_record() {
        let html = DETAIL.replace("£51.77", "£call us");
        let err = parser().parse(&html, &detail_ref()).unwrap_err();
        assert_eq!(err.field, RecordField::Price);
    }

    #[test]
    fn missing_identifier_or_title_fails_the_record() {
        let html = DETAIL.replace("a897fe39b1053632", "   ");
        let err = parser().parse(&html, &detail_ref()).unwrap_err();
        assert_eq!(err.field, RecordField::Identifier);

        let html = DETAIL.replace("<h1>A Light in the Attic</h1>", "");
        let err = parser().parse(&html, &detail_ref()).unwrap_err();
        assert_eq!(err.field, RecordField::Title);
    }

    #[test]
    fn price_prefixes_are_stripped() {
        assert_eq!(parse_price("£51.77"), Some(51.77));
        assert_eq!(parse_price("Â£10.00"), Some(10.0));
        assert_eq!(parse_price(" $3 "), Some(3.0));
        assert_eq!(parse_price("£.99"), Some(0.99));
        assert_eq!(parse_price("£-5.00"), None);
        assert_eq!(parse_price("£"), None);
        assert_eq!(parse_price("free"), None);
    }

    #[test]
    fn identifier_comes_from_the_first_row_only() {
        let html = DETAIL.replace(
            "<tr><th>UPC</th><td>a897fe39b1053632</td></tr>",
            "<tr><th>UPC</th></tr>",
        );
        let err = parser().parse(&html, &detail_ref()).unwrap_err();

        assert_eq!(err.field, RecordField::Identifier);
    }
}
