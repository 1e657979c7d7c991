//! Storefronts scraped from rendered HTML product cards.

use crate::extract::{HtmlCardExtractor, HtmlField};
use crate::pagination::{PageSize, PaginationPolicy};
use crate::render::Interaction;
use crate::strategy::{BrandStrategy, FetchMode};

const CHLOE_PRODUCT_DATA: &str = "data-ytos-track-product-data";

fn storefront(
    brand_id: &'static str,
    name: &'static str,
    page_size: PageSize,
    extractor: HtmlCardExtractor,
) -> BrandStrategy {
    BrandStrategy {
        brand_id,
        name,
        fetch: FetchMode::Rendered {
            interactions: vec![Interaction::ScrollToBottom, Interaction::Wait { ms: 1_000 }],
        },
        pagination: PaginationPolicy::SinglePage,
        page_size,
        category_var: "category",
        locale_var: "locale",
        headers: Vec::new(),
        extractor: Box::new(extractor),
    }
}

/// The listing URL takes `{size}` from the locale and returns every product
/// at once. Card metadata is a JSON document in a data attribute.
pub(super) fn chloe() -> BrandStrategy {
    let json = |name: &str, pointer: &str| HtmlField::attr_json(name, CHLOE_PRODUCT_DATA, pointer);
    let fields = vec![
        json("Cod10", "/product_cod10"),
        json("Title", "/product_title"),
        json("Price", "/product_price"),
        json("position", "/product_position"),
        json("macro_category", "/product_macro_category"),
        json("micro_category", "/product_micro_category"),
        json("macro_category_id", "/product_macro_category_id"),
        json("micro_category_id", "/product_micro_category_id"),
        json("color", "/product_color"),
        json("color_id", "/product_color_id"),
        json("discountedPrice", "/product_discountedPrice"),
        json("price_tf", "/product_price_tf"),
        json("discountedPrice_tf", "/product_discountedPrice_tf"),
        json("quantity", "/product_quantity"),
        json("coupon", "/product_coupon"),
        json("is_in_stock", "/product_is_in_stock"),
        json("list", "/list"),
        HtmlField::link("url", "a", "href", "https://www.chloe.com"),
        HtmlField::attr("img_src", "img", "src"),
        HtmlField::category("category"),
    ];

    storefront(
        "125",
        "chloe",
        PageSize::Locale {
            key: "size",
            default: 200,
        },
        HtmlCardExtractor::new("article.item", fields),
    )
}

pub(super) fn canada_goose() -> BrandStrategy {
    let fields = vec![
        HtmlField::category("category"),
        HtmlField::card_attr("product_id", "data-pid"),
        HtmlField::link("product_url", "a.thumb-link", "href", "https://www.canadagoose.com"),
        HtmlField::text("product_name", "div.product-name"),
        HtmlField::text("price", "span.price-sales span.value"),
        HtmlField::images("image_urls", "div.slideritem img"),
        HtmlField::attr_list("color_options", "a.swatch", "title"),
        HtmlField::attr_list("color_images", "a.swatch img", "data-src"),
    ];

    storefront(
        "110",
        "canada_goose",
        PageSize::Fixed(1),
        HtmlCardExtractor::new("div.product", fields),
    )
}
