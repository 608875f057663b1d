//! Catalog lookups, built once at startup and read-only afterwards

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label used for brand codes missing from the catalog
pub const FALLBACK_BRAND: &str = "Complementary";

/// Supplier assigned to SKUs missing from the product table
pub const FALLBACK_SUPPLIER: &str = "Unassigned";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreInfo {
    pub name: String,
    pub address: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SupplierInfo {
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductInfo {
    pub supplier: String,
    #[serde(default)]
    pub supplier_sku: String,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    /// Keyed by canonical store code
    #[serde(default)]
    pub stores: BTreeMap<String, StoreInfo>,
    /// Keyed by canonical brand code
    #[serde(default)]
    pub brands: BTreeMap<String, String>,
    #[serde(default)]
    pub suppliers: BTreeMap<String, SupplierInfo>,
    /// Keyed by SKU
    #[serde(default)]
    pub products: BTreeMap<String, ProductInfo>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Rewrite store and brand keys through a code normalizer so lookups
    /// match how the snapshot codes are canonicalized.
    pub fn canonicalize_keys(self, canonical: impl Fn(&str) -> String) -> Self {
        Self {
            stores: self
                .stores
                .into_iter()
                .map(|(code, info)| (canonical(&code), info))
                .collect(),
            brands: self
                .brands
                .into_iter()
                .map(|(code, name)| (canonical(&code), name))
                .collect(),
            suppliers: self.suppliers,
            products: self.products,
        }
    }

    pub fn with_store(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.stores.insert(
            code.into(),
            StoreInfo {
                name: name.into(),
                ..StoreInfo::default()
            },
        );
        self
    }

    pub fn with_brand(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.brands.insert(code.into(), name.into());
        self
    }

    pub fn with_product(mut self, sku: impl Into<String>, product: ProductInfo) -> Self {
        self.products.insert(sku.into(), product);
        self
    }

    /// Store display name; unknown codes map to the code itself
    pub fn store_name(&self, code: &str) -> String {
        self.stores
            .get(code)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| code.to_string())
    }

    /// Brand display name; unknown codes map to [`FALLBACK_BRAND`]
    pub fn brand_name(&self, code: &str) -> String {
        self.brands
            .get(code)
            .cloned()
            .unwrap_or_else(|| FALLBACK_BRAND.to_string())
    }

    fn store_by_name(&self, name: &str) -> Option<&StoreInfo> {
        self.stores.values().find(|s| s.name == name)
    }

    pub fn store_address(&self, store_name: &str) -> Option<&str> {
        self.store_by_name(store_name)?.address.as_deref()
    }

    pub fn store_contact(&self, store_name: &str) -> Option<&str> {
        self.store_by_name(store_name)?.contact.as_deref()
    }

    pub fn supplier_contact(&self, supplier: &str) -> Option<&str> {
        self.suppliers.get(supplier)?.contact.as_deref()
    }

    pub fn product(&self, sku: &str) -> Option<&ProductInfo> {
        self.products.get(sku)
    }
}
