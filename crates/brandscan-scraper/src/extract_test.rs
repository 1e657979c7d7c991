use super::*;
use serde_json::json;

fn locale() -> LocaleDescriptor {
    LocaleDescriptor::new(vec![
        ("country_code".to_string(), "us".to_string()),
        ("locale".to_string(), "en_US".to_string()),
    ])
}

fn json_page(value: Value) -> PageResult {
    PageResult::new("https://api.example.com/p", Payload::Json(value))
}

fn html_page(html: &str) -> PageResult {
    PageResult::new("https://shop.example.com/c", Payload::Html(html.to_string()))
}

#[test]
fn json_items_extract_every_declared_field() {
    let extractor = JsonItemsExtractor::new(
        "/products/items",
        vec![
            JsonField::text("productCode"),
            JsonField::text_at("price", "/price/value"),
            JsonField::flag("isOnline"),
            JsonField::url_at("image", "/primaryImage/src"),
            JsonField::link_at("url", "/productLink", "https://www.example.com"),
            JsonField::list_at("images", "/images", "/src"),
            JsonField::category("category"),
            JsonField::locale("country", "country_code"),
        ],
    );
    let page = json_page(json!({
        "products": {"items": [{
            "productCode": "  A-1 ",
            "price": {"value": 1200},
            "isOnline": true,
            "primaryImage": {"src": "//cdn.example.com/a.jpg"},
            "productLink": "/us/en/a-1",
            "images": [{"src": "//cdn.example.com/1.jpg"}, {"src": ""}, {"src": "https://cdn.example.com/2.jpg"}]
        }]}
    }));

    let locale = locale();
    let scope = Scope {
        category: "bags",
        locale: &locale,
    };
    let rows = extractor.extract(&page, &scope).unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.get("productCode"), Some(&json!("A-1")));
    assert_eq!(row.get("price"), Some(&json!(1200)));
    assert_eq!(row.get("isOnline"), Some(&json!("true")));
    assert_eq!(row.get("image"), Some(&json!("https://cdn.example.com/a.jpg")));
    assert_eq!(row.get("url"), Some(&json!("https://www.example.com/us/en/a-1")));
    assert_eq!(
        row.get("images"),
        Some(&json!("https://cdn.example.com/1.jpg | https://cdn.example.com/2.jpg"))
    );
    assert_eq!(row.get("category"), Some(&json!("bags")));
    assert_eq!(row.get("country"), Some(&json!("us")));
}

#[test]
fn missing_fields_are_empty_strings() {
    let extractor = JsonItemsExtractor::new(
        "/hits",
        vec![
            JsonField::text("id"),
            JsonField::text("name"),
            JsonField::raw("variants"),
            JsonField::embedded_json("c_data"),
        ],
    );
    let page = json_page(json!({"hits": [{"id": "x", "name": null}]}));
    let locale = locale();
    let scope = Scope {
        category: "c",
        locale: &locale,
    };
    let rows = extractor.extract(&page, &scope).unwrap();
    let names: Vec<_> = rows[0].fields().map(|(k, _)| k).collect();
    assert_eq!(names, vec!["id", "name", "variants", "c_data"]);
    assert_eq!(rows[0].get("name"), Some(&json!("")));
    assert_eq!(rows[0].get("variants"), Some(&json!("")));
    assert_eq!(rows[0].get("c_data"), Some(&json!("")));
}

#[test]
fn parallel_fields_read_the_sibling_array_by_index() {
    let extractor = JsonItemsExtractor::new(
        "/products",
        vec![
            JsonField::text("id"),
            JsonField::parallel("hit_size", "/hitsAlgolia", "/size"),
        ],
    );
    let page = json_page(json!({
        "products": [{"id": "a"}, {"id": "b"}, {"id": "c"}],
        "hitsAlgolia": [{"size": "S"}, {"size": " M "}]
    }));
    let locale = locale();
    let scope = Scope {
        category: "c",
        locale: &locale,
    };
    let rows = extractor.extract(&page, &scope).unwrap();
    assert_eq!(rows[0].get("hit_size"), Some(&json!("S")));
    assert_eq!(rows[1].get("hit_size"), Some(&json!("M")));
    assert_eq!(rows[2].get("hit_size"), Some(&json!("")));
}

#[test]
fn embedded_json_is_decoded() {
    let extractor = JsonItemsExtractor::new("/hits", vec![JsonField::embedded_json("c_data")]);
    let page = json_page(json!({"hits": [{"c_data": "{\"sizes\": [\"S\", \"M\"]}"}]}));
    let locale = locale();
    let scope = Scope {
        category: "c",
        locale: &locale,
    };
    let rows = extractor.extract(&page, &scope).unwrap();
    assert_eq!(rows[0].get("c_data"), Some(&json!({"sizes": ["S", "M"]})));
}

#[test]
fn absent_items_array_yields_no_rows() {
    let extractor = JsonItemsExtractor::new("/products", vec![JsonField::text("id")]);
    let locale = locale();
    let scope = Scope {
        category: "c",
        locale: &locale,
    };
    assert!(extractor
        .extract(&json_page(json!({"stats": {}})), &scope)
        .unwrap()
        .is_empty());
}

#[test]
fn json_extractor_rejects_html_pages() {
    let extractor = JsonItemsExtractor::new("/products", vec![JsonField::text("id")]);
    let locale = locale();
    let scope = Scope {
        category: "c",
        locale: &locale,
    };
    let err = extractor
        .extract(&html_page("<html></html>"), &scope)
        .unwrap_err();
    assert!(matches!(err, ScraperError::UnexpectedPayload { .. }));
}

#[test]
fn html_cards_extract_attributes_text_and_images() {
    let html = r#"
        <html><body>
          <div class="product" data-pid="CG-1">
            <a class="thumb-link" href="/en-us/parka-1.html">Parka</a>
            <div class="product-name"> Expedition Parka </div>
            <span class="price-sales"><span class="value">1,495</span></span>
            <div class="slideritem"><img srcset="//images.example.com/1.jpg 1x, //images.example.com/1@2x.jpg 2x"></div>
            <div class="slideritem"><img src="//images.example.com/2.jpg"></div>
            <a class="swatch" title="Black"></a>
            <a class="swatch" title="Navy"></a>
          </div>
          <div class="product" data-pid="CG-2">
            <div class="product-name">Vest</div>
          </div>
        </body></html>"#;
    let extractor = HtmlCardExtractor::new(
        "div.product",
        vec![
            HtmlField::card_attr("product_id", "data-pid"),
            HtmlField::link("url", "a.thumb-link", "href", "https://www.example.com"),
            HtmlField::text("name", "div.product-name"),
            HtmlField::text("price", "span.price-sales span.value"),
            HtmlField::images("images", "div.slideritem img"),
            HtmlField::attr("color", "a.swatch", "title"),
            HtmlField::attr_list("colors", "a.swatch", "title"),
            HtmlField::category("category"),
        ],
    );
    let locale = locale();
    let scope = Scope {
        category: "outerwear",
        locale: &locale,
    };
    let rows = extractor.extract(&html_page(html), &scope).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("product_id"), Some(&json!("CG-1")));
    assert_eq!(
        rows[0].get("url"),
        Some(&json!("https://www.example.com/en-us/parka-1.html"))
    );
    assert_eq!(rows[0].get("name"), Some(&json!("Expedition Parka")));
    assert_eq!(rows[0].get("price"), Some(&json!("1,495")));
    assert_eq!(
        rows[0].get("images"),
        Some(&json!(
            "https://images.example.com/1.jpg | https://images.example.com/1@2x.jpg | https://images.example.com/2.jpg"
        ))
    );
    assert_eq!(rows[0].get("color"), Some(&json!("Black")));
    assert_eq!(rows[0].get("colors"), Some(&json!("Black | Navy")));
    assert_eq!(rows[1].get("url"), Some(&json!("")));
    assert_eq!(rows[1].get("color"), Some(&json!("")));
    assert_eq!(rows[1].get("category"), Some(&json!("outerwear")));
}

#[test]
fn html_cards_read_json_attributes() {
    let html = r#"<article class="item" data-ytos-track-product-data='{"product_cod10":"C10","product_title":" Woody tote ","product_price":890}'></article>"#;
    let extractor = HtmlCardExtractor::new(
        "article.item",
        vec![
            HtmlField::attr_json("cod10", "data-ytos-track-product-data", "/product_cod10"),
            HtmlField::attr_json("title", "data-ytos-track-product-data", "/product_title"),
            HtmlField::attr_json("price", "data-ytos-track-product-data", "/product_price"),
            HtmlField::attr_json("missing", "data-ytos-track-product-data", "/nope"),
        ],
    );
    let locale = locale();
    let scope = Scope {
        category: "bags",
        locale: &locale,
    };
    let rows = extractor.extract(&html_page(html), &scope).unwrap();
    assert_eq!(rows[0].get("cod10"), Some(&json!("C10")));
    assert_eq!(rows[0].get("title"), Some(&json!("Woody tote")));
    assert_eq!(rows[0].get("price"), Some(&json!(890)));
    assert_eq!(rows[0].get("missing"), Some(&json!("")));
}

#[test]
fn invalid_selector_is_an_extraction_error() {
    let extractor = HtmlCardExtractor::new("div[", vec![]);
    let locale = locale();
    let scope = Scope {
        category: "c",
        locale: &locale,
    };
    let err = extractor
        .extract(&html_page("<div></div>"), &scope)
        .unwrap_err();
    assert!(matches!(err, ScraperError::Extraction { .. }));
}
