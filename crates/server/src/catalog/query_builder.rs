//! Product listing query builder using SeaQuery.
//!
//! Turns a [`ProductFilter`] into two parameterized statements that share one
//! set of WHERE conditions: the page query and its COUNT query. Values are
//! always bound as parameters, never inlined into the SQL text.

use sea_query::{
    Asterisk, Cond, Expr, Func, Iden, JoinType, Order, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr, Values,
};

use super::filter::{ProductFilter, ProductSort};
use crate::schema::{Categories, Materials, ProductMaterials, ProductTags, Products, Tags};

#[derive(Iden)]
#[iden = "p"]
struct P;

#[derive(Iden)]
#[iden = "c"]
struct C;

#[derive(Iden)]
#[iden = "m"]
struct M;

#[derive(Iden)]
#[iden = "pm"]
struct Pm;

#[derive(Iden)]
#[iden = "t"]
struct T;

#[derive(Iden)]
#[iden = "pt"]
struct Pt;

#[derive(Iden)]
#[iden = "category"]
struct CategoryLabel;

#[derive(Iden)]
#[iden = "category_slug"]
struct CategorySlugLabel;

#[derive(Iden)]
#[iden = "image_url"]
struct ImageUrlLabel;

#[derive(Iden)]
#[iden = "materials"]
struct MaterialsLabel;

#[derive(Iden)]
#[iden = "tags"]
struct TagsLabel;

/// Primary image of the row's product, or NULL.
const PRIMARY_IMAGE_SQL: &str = "(SELECT pi.image_url FROM product_images pi \
     WHERE pi.product_id = p.id AND pi.is_primary = TRUE \
     ORDER BY pi.display_order, pi.id LIMIT 1)";

/// Linked materials as a JSON array of `{name, slug}`, de-duplicated and
/// ordered by name.
const MATERIALS_JSON_SQL: &str = "COALESCE((SELECT json_agg(json_build_object('name', x.name, 'slug', x.slug) \
     ORDER BY x.name, x.slug) FROM (SELECT DISTINCT m.name, m.slug FROM product_materials pm \
     JOIN materials m ON m.id = pm.material_id WHERE pm.product_id = p.id) x), '[]'::json)";

/// Linked tags as a JSON array of `{name, slug}`, de-duplicated and ordered
/// by name.
const TAGS_JSON_SQL: &str = "COALESCE((SELECT json_agg(json_build_object('name', x.name, 'slug', x.slug) \
     ORDER BY x.name, x.slug) FROM (SELECT DISTINCT t.name, t.slug FROM product_tags pt \
     JOIN tags t ON t.id = pt.tag_id WHERE pt.product_id = p.id) x), '[]'::json)";

/// Query builder for product listings.
pub struct ProductQueryBuilder<'a> {
    filter: &'a ProductFilter,
}

impl<'a> ProductQueryBuilder<'a> {
    pub fn new(filter: &'a ProductFilter) -> Self {
        Self { filter }
    }

    /// Build the page query: one aggregated row per product.
    pub fn build(&self) -> (String, Values) {
        let mut query = Query::select();

        query
            .columns([
                (P, Products::Id),
                (P, Products::Slug),
                (P, Products::Name),
                (P, Products::CategoryId),
                (P, Products::Description),
                (P, Products::Featured),
                (P, Products::Stock),
                (P, Products::LowStockThreshold),
                (P, Products::WaTemplate),
                (P, Products::IsActive),
                (P, Products::CreatedAt),
                (P, Products::UpdatedAt),
            ])
            .expr_as(Expr::col((C, Categories::Name)), CategoryLabel)
            .expr_as(Expr::col((C, Categories::Slug)), CategorySlugLabel)
            .expr_as(Expr::cust(PRIMARY_IMAGE_SQL), ImageUrlLabel)
            .expr_as(Expr::cust(MATERIALS_JSON_SQL), MaterialsLabel)
            .expr_as(Expr::cust(TAGS_JSON_SQL), TagsLabel);

        self.add_from(&mut query);
        query.cond_where(self.conditions());
        self.add_sorts(&mut query);

        query.limit(u64::from(self.filter.limit));
        query.offset(self.filter.offset());

        query.build(PostgresQueryBuilder)
    }

    /// Build the COUNT query matching [`build`](Self::build) without
    /// ordering or pagination.
    pub fn build_count(&self) -> (String, Values) {
        let mut query = Query::select();

        query.expr(Expr::col(Asterisk).count());

        self.add_from(&mut query);
        query.cond_where(self.conditions());

        query.build(PostgresQueryBuilder)
    }

    /// `products p JOIN categories c`; every product has exactly one category.
    fn add_from(&self, query: &mut SelectStatement) {
        query.from_as(Products::Table, P).join_as(
            JoinType::InnerJoin,
            Categories::Table,
            C,
            Expr::col((C, Categories::Id)).equals((P, Products::CategoryId)),
        );
    }

    /// WHERE conditions shared by the page and count queries.
    fn conditions(&self) -> Cond {
        let filter = self.filter;
        let mut cond = Cond::all();

        if !filter.include_inactive {
            cond = cond.add(Expr::col((P, Products::IsActive)).eq(true));
        }

        if let Some(featured) = filter.featured {
            cond = cond.add(Expr::col((P, Products::Featured)).eq(featured));
        }

        if !filter.categories.is_empty() {
            cond = cond.add(Expr::col((C, Categories::Slug)).is_in(filter.categories.clone()));
        }

        if !filter.materials.is_empty() {
            cond = cond.add(material_exists(&filter.materials));
        }

        if !filter.tags.is_empty() {
            cond = cond.add(tag_exists(&filter.tags));
        }

        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", escape_like_wildcards(&search.to_lowercase()));
            let name = SimpleExpr::from(Func::lower(Expr::col((P, Products::Name))));
            let description = SimpleExpr::from(Func::lower(Expr::col((P, Products::Description))));
            cond = cond.add(
                Cond::any()
                    .add(name.like(pattern.clone()))
                    .add(description.like(pattern)),
            );
        }

        cond
    }

    /// ORDER BY for the requested sort, always ending on the product id.
    fn add_sorts(&self, query: &mut SelectStatement) {
        match self.filter.sort {
            ProductSort::Relevance => {
                query
                    .order_by((P, Products::Featured), Order::Desc)
                    .order_by((P, Products::CreatedAt), Order::Desc)
                    .order_by((P, Products::Id), Order::Desc);
            }
            ProductSort::NameAsc => {
                query
                    .order_by((P, Products::Name), Order::Asc)
                    .order_by((P, Products::Id), Order::Asc);
            }
            ProductSort::NameDesc => {
                query
                    .order_by((P, Products::Name), Order::Desc)
                    .order_by((P, Products::Id), Order::Desc);
            }
            ProductSort::Recent => {
                query
                    .order_by((P, Products::CreatedAt), Order::Desc)
                    .order_by((P, Products::Id), Order::Desc);
            }
        }
    }
}

/// `EXISTS` over the material links: the product has any of the slugs.
fn material_exists(slugs: &[String]) -> SimpleExpr {
    let subquery = Query::select()
        .expr(Expr::cust("1"))
        .from_as(ProductMaterials::Table, Pm)
        .join_as(
            JoinType::InnerJoin,
            Materials::Table,
            M,
            Expr::col((M, Materials::Id)).equals((Pm, ProductMaterials::MaterialId)),
        )
        .and_where(Expr::col((Pm, ProductMaterials::ProductId)).equals((P, Products::Id)))
        .and_where(Expr::col((M, Materials::Slug)).is_in(slugs.to_vec()))
        .to_owned();
    Expr::exists(subquery)
}

/// `EXISTS` over the tag links: the product has any of the slugs.
fn tag_exists(slugs: &[String]) -> SimpleExpr {
    let subquery = Query::select()
        .expr(Expr::cust("1"))
        .from_as(ProductTags::Table, Pt)
        .join_as(
            JoinType::InnerJoin,
            Tags::Table,
            T,
            Expr::col((T, Tags::Id)).equals((Pt, ProductTags::TagId)),
        )
        .and_where(Expr::col((Pt, ProductTags::ProductId)).equals((P, Products::Id)))
        .and_where(Expr::col((T, Tags::Slug)).is_in(slugs.to_vec()))
        .to_owned();
    Expr::exists(subquery)
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::filter::PageLimits;
    use sea_query::Value;

    fn filter(query: &str) -> ProductFilter {
        ProductFilter::from_query(Some(query), PageLimits::default()).unwrap()
    }

    fn strings(values: &Values) -> Vec<String> {
        values
            .0
            .iter()
            .filter_map(|v| match v {
                Value::String(Some(s)) => Some(s.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn default_listing_only_shows_active_products() {
        let f = filter("");
        let (sql, values) = ProductQueryBuilder::new(&f).build();

        assert!(sql.contains(r#""p"."is_active" = $1"#), "{sql}");
        assert_eq!(values.0[0], Value::Bool(Some(true)));
        assert!(sql.contains(r#"FROM "products" AS "p""#), "{sql}");
        assert!(sql.contains(r#"INNER JOIN "categories" AS "c""#), "{sql}");
    }

    #[test]
    fn admin_listing_can_include_inactive() {
        let mut f = filter("");
        f.include_inactive = true;
        let (sql, _) = ProductQueryBuilder::new(&f).build_count();
        assert!(!sql.contains("is_active"), "{sql}");
    }

    #[test]
    fn relevance_orders_featured_then_newest_then_id() {
        let f = filter("");
        let (sql, _) = ProductQueryBuilder::new(&f).build();
        assert!(
            sql.contains(
                r#"ORDER BY "p"."featured" DESC, "p"."created_at" DESC, "p"."id" DESC"#
            ),
            "{sql}"
        );
    }

    #[test]
    fn name_sorts_are_mirror_images() {
        let (asc, _) = ProductQueryBuilder::new(&filter("sort=name-asc")).build();
        let (desc, _) = ProductQueryBuilder::new(&filter("sort=name-desc")).build();
        assert!(asc.contains(r#"ORDER BY "p"."name" ASC, "p"."id" ASC"#), "{asc}");
        assert!(desc.contains(r#"ORDER BY "p"."name" DESC, "p"."id" DESC"#), "{desc}");
    }

    #[test]
    fn recent_sort_breaks_ties_on_id() {
        let (sql, _) = ProductQueryBuilder::new(&filter("sort=recent")).build();
        assert!(
            sql.contains(r#"ORDER BY "p"."created_at" DESC, "p"."id" DESC"#),
            "{sql}"
        );
    }

    #[test]
    fn category_filter_matches_slug_set() {
        let f = filter("categoria=anillos&categoria=aretes");
        let (sql, values) = ProductQueryBuilder::new(&f).build();
        assert!(sql.contains(r#""c"."slug" IN ("#), "{sql}");
        assert_eq!(strings(&values), vec!["anillos", "aretes"]);
    }

    #[test]
    fn material_and_tag_filters_use_exists() {
        let f = filter("material=oro&tag=boda&tag=regalo");
        let (sql, values) = ProductQueryBuilder::new(&f).build();
        assert_eq!(sql.matches("EXISTS").count(), 2, "{sql}");
        assert!(sql.contains(r#""product_materials" AS "pm""#), "{sql}");
        assert!(sql.contains(r#""product_tags" AS "pt""#), "{sql}");
        assert!(sql.contains(r#""pm"."product_id" = "p"."id""#), "{sql}");
        assert_eq!(strings(&values), vec!["oro", "boda", "regalo"]);
    }

    #[test]
    fn search_is_case_insensitive_on_name_or_description() {
        let f = filter("q=Collar");
        let (sql, values) = ProductQueryBuilder::new(&f).build();
        assert!(sql.contains(r#"LOWER("p"."name") LIKE"#), "{sql}");
        assert!(sql.contains(r#"LOWER("p"."description") LIKE"#), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
        assert_eq!(strings(&values), vec!["%collar%", "%collar%"]);
    }

    #[test]
    fn search_escapes_like_wildcards() {
        let f = filter("q=100%25_off");
        let (_, values) = ProductQueryBuilder::new(&f).build();
        assert_eq!(strings(&values)[0], "%100\\%\\_off%");
    }

    #[test]
    fn featured_only_filters_when_supplied() {
        let (absent, _) = ProductQueryBuilder::new(&filter("")).build();
        assert!(!absent.contains(r#""p"."featured" ="#), "{absent}");

        let f = filter("featured=false");
        let (sql, values) = ProductQueryBuilder::new(&f).build();
        assert!(sql.contains(r#""p"."featured" = $2"#), "{sql}");
        assert_eq!(values.0[1], Value::Bool(Some(false)));
    }

    #[test]
    fn count_shares_conditions_without_pagination() {
        let f = filter("categoria=anillos&material=oro&q=sol&featured=true&page=2&limit=1");
        let builder = ProductQueryBuilder::new(&f);
        let (rows_sql, rows_values) = builder.build();
        let (count_sql, count_values) = builder.build_count();

        assert!(count_sql.contains("COUNT(*)"), "{count_sql}");
        assert!(!count_sql.contains("ORDER BY"), "{count_sql}");
        assert!(!count_sql.contains("LIMIT"), "{count_sql}");
        assert!(rows_sql.contains("LIMIT"), "{rows_sql}");
        assert!(rows_sql.contains("OFFSET"), "{rows_sql}");

        // The page query only adds LIMIT and OFFSET on top of the filters.
        assert_eq!(rows_values.0.len(), count_values.0.len() + 2);
        assert_eq!(&rows_values.0[..count_values.0.len()], &count_values.0[..]);
    }

    #[test]
    fn pagination_values_are_bound() {
        let f = filter("page=3&limit=10");
        let (_, values) = ProductQueryBuilder::new(&f).build();
        let tail = &values.0[values.0.len() - 2..];
        assert_eq!(tail[0], Value::BigUnsigned(Some(10)));
        assert_eq!(tail[1], Value::BigUnsigned(Some(20)));
    }

    #[test]
    fn user_input_never_reaches_sql_text() {
        let f = filter("q=%27%3B%20DROP%20TABLE%20products%3B--&categoria=x%27or%271");
        let (sql, _) = ProductQueryBuilder::new(&f).build();
        assert!(!sql.contains("DROP TABLE"), "{sql}");
        assert!(!sql.contains("x'or'1"), "{sql}");
    }

    #[test]
    fn escape_like_wildcards_function() {
        assert_eq!(escape_like_wildcards("hello"), "hello");
        assert_eq!(escape_like_wildcards("100%"), "100\\%");
        assert_eq!(escape_like_wildcards("a_b"), "a\\_b");
        assert_eq!(escape_like_wildcards("a\\b"), "a\\\\b");
    }
}
