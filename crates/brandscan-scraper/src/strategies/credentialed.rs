//! Commerce APIs that only answer with a short-lived bearer token.
//!
//! The token is captured from the storefront's own traffic after driving the
//! listing UI, then sent on plain API requests.

use crate::extract::{JsonField, JsonItemsExtractor};
use crate::pagination::{PageSize, PaginationPolicy, TotalField};
use crate::render::{CredentialSource, Interaction};
use crate::strategy::{BrandStrategy, FetchMode};

const DOLCE_LOAD_MORE: &str =
    "button.CategoryPaginationLoadMore__category-pagination__load-more--SOwaX";

pub(super) fn dolce_gabbana() -> BrandStrategy {
    let load_more = Interaction::ClickSelector {
        selector: DOLCE_LOAD_MORE.to_string(),
    };
    let pause = Interaction::Wait { ms: 1_000 };

    let fields = vec![
        JsonField::category("category"),
        JsonField::text("productId"),
        JsonField::text("productName"),
        JsonField::text("price"),
        JsonField::text("pricePerUnit"),
        JsonField::text("currency"),
        JsonField::text("hitType"),
        JsonField::flag_at("productType_variationGroup", "/productType/variationGroup"),
        JsonField::flag("orderable"),
        JsonField::text_at("representedProduct_id", "/representedProduct/id"),
        JsonField::list_at("representedProduct_ids", "/representedProducts", "/id"),
        JsonField::url_at("image", "/image/link"),
        JsonField::text_at("image_alt", "/image/alt"),
        JsonField::link_at("c_url", "/c_url", "https://www.dolcegabbana.com"),
    ];

    BrandStrategy {
        brand_id: "157",
        name: "dolce_gabbana",
        fetch: FetchMode::CredentialHttp(CredentialSource {
            landing_url: "https://www.dolcegabbana.com/en-us/fashion/women/bags/handbags/"
                .to_string(),
            interactions: vec![
                Interaction::ScrollToBottom,
                load_more.clone(),
                pause.clone(),
                load_more,
                pause,
            ],
        }),
        pagination: PaginationPolicy::KnownTotal {
            total: TotalField::at("/total"),
            probe: None,
        },
        page_size: PageSize::Locale {
            key: "limit",
            default: 48,
        },
        category_var: "category",
        locale_var: "locale",
        headers: Vec::new(),
        extractor: Box::new(JsonItemsExtractor::new("/hits", fields)),
    }
}

/// The item total is only exposed on each hit (`c_totalProducts`), so a
/// two-item probe reads it before the real pages are requested.
pub(super) fn loewe() -> BrandStrategy {
    let fields = vec![
        JsonField::text_at("brand", "/c_gtm_data/brand"),
        JsonField::text_at("category", "/c_gtm_data/category"),
        JsonField::text_at("id", "/c_gtm_data/id"),
        JsonField::text_at("name", "/c_gtm_data/name"),
        JsonField::text_at("price_gtm", "/c_gtm_data/price"),
        JsonField::text_at("productColor", "/c_gtm_data/productColor"),
        JsonField::text_at("colorId", "/c_gtm_data/colorId"),
        JsonField::text_at("productEan", "/c_gtm_data/productEan"),
        JsonField::text_at("productGender", "/c_gtm_data/productGender"),
        JsonField::text_at("productMasterId", "/c_gtm_data/productMasterId"),
        JsonField::text_at("productStock", "/c_gtm_data/productStock"),
        JsonField::flag_at("isDiscounted", "/c_gtm_data/isDiscounted"),
        JsonField::text_at("position_gtm", "/c_gtm_data/position"),
        JsonField::text("currency"),
        JsonField::raw("image"),
        JsonField::url_at("imageUrl", "/image/link"),
        JsonField::flag("orderable"),
        JsonField::text("price"),
        JsonField::text("pricePerUnit"),
        JsonField::text("productId"),
        JsonField::text("productName"),
        JsonField::raw("productType"),
        JsonField::raw("representedProduct"),
        JsonField::raw("representedProducts"),
        JsonField::text("c_totalProducts"),
        JsonField::text("c_lineImagePath"),
        JsonField::text("c_productDetailPageURL"),
        JsonField::url_at("c_imageURL", "/c_imageURL"),
        JsonField::flag("c_isPromoPrice"),
        JsonField::flag("c_showStandardPrice"),
        JsonField::text("c_salesPriceFormatted"),
        JsonField::text("c_standardPriceFormatted"),
        JsonField::flag("c_hidePrice"),
        JsonField::embedded_json("c_colorSwatches"),
        JsonField::text("c_colorSelected"),
        JsonField::embedded_json("c_allImages"),
        JsonField::text("c_LW_limiterColorBadges"),
        JsonField::text("c_availabilityStatus"),
        JsonField::text("c_productDetailUrlComplete"),
    ];

    BrandStrategy {
        brand_id: "310",
        name: "loewe",
        fetch: FetchMode::CredentialHttp(CredentialSource {
            landing_url: "https://www.loewe.com/usa/en/women/shoes".to_string(),
            interactions: vec![
                Interaction::ScrollToBottom,
                Interaction::Wait { ms: 1_000 },
                Interaction::ScrollToBottom,
                Interaction::Wait { ms: 1_000 },
            ],
        }),
        pagination: PaginationPolicy::KnownTotal {
            total: TotalField::at("/hits/0/c_totalProducts"),
            probe: Some(2),
        },
        page_size: PageSize::Locale {
            key: "limit",
            default: 48,
        },
        category_var: "category",
        locale_var: "locale",
        headers: Vec::new(),
        extractor: Box::new(JsonItemsExtractor::new("/hits", fields)),
    }
}
