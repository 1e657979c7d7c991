//! Brands whose listings come back as JSON documents.

use crate::extract::{JsonField, JsonItemsExtractor};
use crate::pagination::{PageSize, PaginationPolicy, TotalField};
use crate::strategy::{BrandStrategy, FetchMode};

fn json_strategy(
    brand_id: &'static str,
    name: &'static str,
    fetch: FetchMode,
    pagination: PaginationPolicy,
    page_size: PageSize,
    extractor: JsonItemsExtractor,
) -> BrandStrategy {
    BrandStrategy {
        brand_id,
        name,
        fetch,
        pagination,
        page_size,
        category_var: "category",
        locale_var: "locale",
        headers: Vec::new(),
        extractor: Box::new(extractor),
    }
}

/// Gucci's listing API sits behind bot protection, so pages are rendered and
/// the JSON read back out of the browser's `<pre>` viewer.
pub(super) fn gucci() -> BrandStrategy {
    let flags = [
        "isFavorite",
        "isOnlineExclusive",
        "isRegionalOnlineExclusive",
        "isExclusiveSale",
        "showSavedItemIcon",
        "isDiyProduct",
        "inStockEntry",
        "inStoreStockEntry",
        "inStoreStockRegionalEntry",
        "visibleWithoutStock",
        "showAvailableInStoreOnlyLabel",
        "showOutOfStockLabel",
    ];

    let mut fields = vec![
        JsonField::category("category"),
        JsonField::text("productCode"),
        JsonField::text("title"),
        JsonField::text("price"),
        JsonField::text("rawPrice"),
        JsonField::text("productLink"),
        JsonField::url_at("primaryImage", "/primaryImage/src"),
        JsonField::list_at("alternateGalleryImages", "/alternateGalleryImages", "/src"),
        JsonField::url_at("alternateImage", "/alternateImage/src"),
        JsonField::text("regionalOnlineExclusiveMsg"),
        JsonField::text("label"),
        JsonField::text("fullPrice"),
        JsonField::text("position"),
        JsonField::text("productName"),
        JsonField::text("type"),
        JsonField::text("saleType"),
        JsonField::text("categoryPath"),
        JsonField::text("variant"),
        JsonField::url_at("videoBackgroundImage", "/videoBackgroundImage"),
        JsonField::url_at("zoomImagePrimary", "/zoomImagePrimary"),
        JsonField::url_at("zoomImageAlternate", "/zoomImageAlternate"),
        JsonField::text("filterType"),
        JsonField::text("nonTransactionalWebSite"),
    ];
    fields.extend(flags.iter().map(|name| JsonField::flag(name)));

    json_strategy(
        "229",
        "gucci",
        FetchMode::Rendered {
            interactions: Vec::new(),
        },
        PaginationPolicy::KnownPages {
            pages: TotalField::at("/numberOfPages"),
        },
        PageSize::Fixed(24),
        JsonItemsExtractor::new("/products/items", fields),
    )
}

pub(super) fn loro_piana() -> BrandStrategy {
    let fields = vec![
        JsonField::category("category"),
        JsonField::locale("country_code", "country_code"),
        JsonField::text("code"),
        JsonField::text("name"),
        JsonField::flag("solrIsFeatured"),
        JsonField::flag("invertedImages"),
        JsonField::flag("genderFluid"),
        JsonField::flag("isAvailable"),
        JsonField::text("variantsNr"),
        JsonField::text_at("price_currencyIso", "/price/currencyIso"),
        JsonField::text_at("price_value", "/price/value"),
        JsonField::text_at("price_priceType", "/price/priceType"),
        JsonField::text_at("price_formattedValue", "/price/formattedValue"),
        JsonField::text_at("price_minQuantity", "/price/minQuantity"),
        JsonField::text_at("price_maxQuantity", "/price/maxQuantity"),
        JsonField::url_at("primaryImage", "/images/0/url"),
        JsonField::list_at("images", "/images", "/url"),
        JsonField::flag("configurable"),
        JsonField::text("eshopMaterialCode"),
        JsonField::text("gtmInfo"),
        JsonField::text("alternativeUrl"),
        JsonField::text("relativeUrl"),
        JsonField::text("url"),
        JsonField::text("colors"),
        JsonField::text("variantSizes"),
        JsonField::raw("allColorVariants"),
        JsonField::text("productsInLook"),
        JsonField::flag("configurableMto"),
        JsonField::flag("configurableScarves"),
        JsonField::text("doubleGender"),
        JsonField::flag("preorderable"),
        JsonField::text("backorderable"),
        JsonField::flag("flPreviewProduct"),
        JsonField::text("digitalUrl"),
        JsonField::text("description"),
        JsonField::flag("eshopValid"),
        JsonField::flag("forceMrf"),
        JsonField::flag("normalProductEshopValid"),
    ];

    json_strategy(
        "314",
        "loro_piana",
        FetchMode::Http,
        PaginationPolicy::KnownPages {
            pages: TotalField::at("/pagination/numberOfPages"),
        },
        PageSize::Fixed(24),
        JsonItemsExtractor::new("/results", fields),
    )
}

/// Category groups carry their own templates, which name the category
/// `{clothing_category}`. The reported page count is one short.
pub(super) fn alexander_mcqueen() -> BrandStrategy {
    const ORIGIN: &str = "https://www.alexandermcqueen.com";
    let fields = vec![
        JsonField::category("category"),
        JsonField::text("id"),
        JsonField::text("isSku"),
        JsonField::text("isSmc"),
        JsonField::text("name"),
        JsonField::text("microColor"),
        JsonField::text("microColorHexa"),
        JsonField::text("color"),
        JsonField::text("size"),
        JsonField::text("styleMaterialColor"),
        JsonField::text("brightcoveId"),
        JsonField::list_at("images", "/images", "/src"),
        JsonField::text("bornSeasonDesc"),
        JsonField::text_at("macroCategory", "/categories/macroCategory"),
        JsonField::text_at(
            "superMicroCategory_en_US",
            "/categories/superMicroCategory/en_US",
        ),
        JsonField::link_at("url", "/url", ORIGIN),
        JsonField::link_at("smcUrl", "/smcUrl", ORIGIN),
        JsonField::url_at("alternativeAsset", "/alternativeAsset/src"),
        JsonField::flag_at("price_hasSalePrice", "/price/hasSalePrice"),
        JsonField::text_at("price_currencyCode", "/price/currencyCode"),
        JsonField::text_at("price_percentageOff", "/price/percentageOff"),
        JsonField::text_at("price_listPrice", "/price/listPrice"),
        JsonField::text_at("price_salePrice", "/price/salePrice"),
        JsonField::text_at("price_finalPrice", "/price/finalPrice"),
    ];

    let mut strategy = json_strategy(
        "26",
        "alexander_mcqueen",
        FetchMode::Http,
        PaginationPolicy::KnownPages {
            pages: TotalField {
                pointer: "/stats/nbPages",
                adjust: 1,
            },
        },
        PageSize::Fixed(24),
        JsonItemsExtractor::new("/products", fields),
    );
    strategy.category_var = "clothing_category";
    strategy
}

/// Each product is paired with the search hit at the same index.
pub(super) fn saint_laurent() -> BrandStrategy {
    const HITS: &str = "/hitsAlgolia";
    let fields = vec![
        JsonField::text_at("category", "/categories/productCategory"),
        JsonField::text_at("product_url", "/url"),
        JsonField::text_at("product_color", "/color"),
        JsonField::raw_at("product_relatedColors", "/relatedColors"),
        JsonField::text_at("product_styleMaterialColor", "/styleMaterialColor"),
        JsonField::list_at("product_thumbnailUrls", "/thumbnailUrls", ""),
        JsonField::flag_at("product_inStock", "/inStock"),
        JsonField::text_at("product_stock", "/stock"),
        JsonField::list_at("product_categoryIds", "/categoryIds", ""),
        JsonField::text_at("product_ID", "/id"),
        JsonField::text_at("product_bornSeasonDesc", "/bornSeasonDesc"),
        JsonField::text_at("product_name", "/name"),
        JsonField::text_at("product_microColor", "/microColor"),
        JsonField::url_at("product_image", "/image/src"),
        JsonField::list_at("product_images", "/images", "/srcset"),
        JsonField::parallel("hit_id", HITS, "/id"),
        JsonField::parallel("hit_isSku", HITS, "/isSku"),
        JsonField::parallel("hit_size", HITS, "/size"),
        JsonField::parallel("hit_imageThumbnail", HITS, "/imageThumbnail/src"),
        JsonField::parallel("hit_formattedSize", HITS, "/formattedSize"),
        JsonField::raw_at("hit_swatches", "/swatches"),
        JsonField::text_at("price_id", "/price/id"),
        JsonField::flag_at("price_has_sale_price", "/price/hasSalePrice"),
        JsonField::text_at("price_currency", "/price/currencyCode"),
        JsonField::text_at("price_percentageOff", "/price/percentageOff"),
        JsonField::text_at("sale_price", "/price/salePrice"),
        JsonField::text_at("list_price", "/price/listPrice"),
        JsonField::text_at("final_price", "/price/finalPrice"),
        JsonField::flag_at("has_empl_sale", "/price/hasEmployeeSalePromotion"),
        JsonField::flag_at("isPriceOnDemand", "/price/isPriceOnDemand"),
    ];

    json_strategy(
        "478",
        "saint_laurent",
        FetchMode::Http,
        PaginationPolicy::KnownPages {
            pages: TotalField::at("/stats/nbPages"),
        },
        PageSize::Fixed(24),
        JsonItemsExtractor::new("/products", fields),
    )
}

/// Rendered because the API only answers browser sessions; the JSON arrives
/// as the body text. Locales are plain `{country_code}` values.
pub(super) fn moncler() -> BrandStrategy {
    let fields = vec![
        JsonField::category("category"),
        JsonField::text("id"),
        JsonField::text("productName"),
        JsonField::text("shortDescription"),
        JsonField::link_at("productUrl", "/productUrl", "https://www.moncler.com"),
        JsonField::text_at("price", "/price/sales/formatted"),
        JsonField::text_at("price_min", "/price/min/sales/formatted"),
        JsonField::text_at("price_max", "/price/max/sales/formatted"),
        JsonField::list_at("imageUrls", "/imgs/urls", ""),
        JsonField::raw("productCharacteristics"),
        JsonField::raw("variationAttributes"),
    ];

    let mut strategy = json_strategy(
        "363",
        "moncler",
        FetchMode::Rendered {
            interactions: Vec::new(),
        },
        PaginationPolicy::RunningCount {
            total: TotalField::at("/data/count"),
        },
        PageSize::Fixed(48),
        JsonItemsExtractor::new("/data/products", fields),
    );
    strategy.locale_var = "country_code";
    strategy
}

/// Offsets are `{start}`/`{size}`; the page size comes from the locale.
pub(super) fn stone_island() -> BrandStrategy {
    let fields = vec![
        JsonField::category("category"),
        JsonField::locale("locale", "locale"),
        JsonField::text("type"),
        JsonField::text("masterId"),
        JsonField::text("uuid"),
        JsonField::text("id"),
        JsonField::text("productName"),
        JsonField::text("shortDescription"),
        JsonField::text("productUrl"),
        JsonField::text("route"),
        JsonField::text("originalModelName"),
        JsonField::flag("isComingSoon"),
        JsonField::text_at("price_sales_value", "/price/sales/value"),
        JsonField::text_at("price_sales_currency", "/price/sales/currency"),
        JsonField::text_at("price_sales_formatted", "/price/sales/formatted"),
        JsonField::list_at("image_urls", "/imgs/urls", ""),
        JsonField::text_at("image_alt", "/imgs/alt"),
        JsonField::text_at("analytics_item_name", "/analyticsAttributes/item_name"),
        JsonField::text_at("analytics_item_category", "/analyticsAttributes/item_category"),
        JsonField::text_at("analytics_item_category2", "/analyticsAttributes/item_category2"),
        JsonField::text_at("analytics_item_category3", "/analyticsAttributes/item_category3"),
        JsonField::text_at("analytics_item_category4", "/analyticsAttributes/item_category4"),
        JsonField::text_at("analytics_item_category5", "/analyticsAttributes/item_category5"),
        JsonField::text_at("analytics_item_variant", "/analyticsAttributes/item_variant"),
        JsonField::text_at("analytics_item_MFC", "/analyticsAttributes/item_MFC"),
        JsonField::flag_at("availability_lowStock", "/availability/lowStock"),
        JsonField::flag("available"),
        JsonField::flag_at("earlyaccess_private", "/earlyaccess/private"),
        JsonField::text("imageBackground"),
        JsonField::text_at("assetOverride_plp", "/assetOverride/plp"),
        JsonField::text_at("assetOverride_plpeditorial", "/assetOverride/plpeditorial"),
        JsonField::text_at("assetOverride_icongallery", "/assetOverride/icongallery"),
        JsonField::text("seoName"),
        JsonField::raw("variationAttributes"),
    ];

    json_strategy(
        "500",
        "stone_island",
        FetchMode::Http,
        PaginationPolicy::KnownTotal {
            total: TotalField::at("/data/count"),
            probe: None,
        },
        PageSize::Locale {
            key: "size",
            default: 48,
        },
        JsonItemsExtractor::new("/data/products", fields),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Scope;
    use crate::page::{PageResult, Payload};
    use brandscan_core::LocaleDescriptor;
    use serde_json::json;

    #[test]
    fn gucci_reads_items_and_flags() {
        let strategy = gucci();
        let page = PageResult::new(
            "https://x",
            Payload::Json(json!({
                "numberOfPages": 1,
                "products": {"items": [{
                    "productCode": "G1",
                    "title": "Jackie 1961\n",
                    "primaryImage": {"src": "//media.gucci.com/1.jpg"},
                    "isFavorite": false,
                    "position": 3
                }]}
            })),
        );
        let locale = LocaleDescriptor::from_code("us/en");
        let rows = strategy
            .extractor
            .extract(
                &page,
                &Scope {
                    category: "bags",
                    locale: &locale,
                },
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("category"), Some(&json!("bags")));
        assert_eq!(rows[0].get("title"), Some(&json!("Jackie 1961")));
        assert_eq!(
            rows[0].get("primaryImage"),
            Some(&json!("https://media.gucci.com/1.jpg"))
        );
        assert_eq!(rows[0].get("isFavorite"), Some(&json!("false")));
        assert_eq!(rows[0].get("inStockEntry"), Some(&json!("")));
        assert_eq!(rows[0].get("position"), Some(&json!(3)));
    }

    #[test]
    fn mcqueen_binds_clothing_category_and_prefixes_urls() {
        let strategy = alexander_mcqueen();
        assert_eq!(strategy.category_var, "clothing_category");
        let page = PageResult::new(
            "https://x",
            Payload::Json(json!({"products": [{"id": "M1", "url": "/en-us/m1.html", "categories": {}}]})),
        );
        let locale = LocaleDescriptor::from_code("en-us");
        let rows = strategy
            .extractor
            .extract(
                &page,
                &Scope {
                    category: "coats",
                    locale: &locale,
                },
            )
            .unwrap();
        assert_eq!(
            rows[0].get("url"),
            Some(&json!("https://www.alexandermcqueen.com/en-us/m1.html"))
        );
        assert_eq!(rows[0].get("smcUrl"), Some(&json!("")));
    }
}
