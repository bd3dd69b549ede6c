//! Table and column identifiers for statements built with SeaQuery.

use sea_query::Iden;

#[derive(Iden)]
pub enum Products {
    Table,
    Id,
    Slug,
    Name,
    CategoryId,
    Description,
    Featured,
    Stock,
    LowStockThreshold,
    WaTemplate,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Categories {
    Table,
    Id,
    Name,
    Slug,
}

#[derive(Iden)]
pub enum Materials {
    Table,
    Id,
    Slug,
}

#[derive(Iden)]
pub enum Tags {
    Table,
    Id,
    Slug,
}

#[derive(Iden)]
pub enum ProductMaterials {
    Table,
    ProductId,
    MaterialId,
}

#[derive(Iden)]
pub enum ProductTags {
    Table,
    ProductId,
    TagId,
}
