//! `cartwright route` — Resolve a navigation query without the model.

use cartwright_tools::routing::NavigationRequest;
use cartwright_tools::{match_query_to_route_keyword, normalize_product_name, resolve, slugify};

fn request(
    query: &str,
    authenticated: bool,
    product: Option<String>,
    category: Option<String>,
    room: Option<String>,
) -> NavigationRequest {
    let slug = product.map(|name| slugify(&normalize_product_name(&name)));
    let route_keyword = if slug.is_some() {
        "product-details"
    } else {
        match_query_to_route_keyword(query)
    };

    NavigationRequest {
        route_keyword: Some(route_keyword.to_string()),
        slug,
        user_authenticated: authenticated,
        category,
        room,
    }
}

pub fn run(
    query: &str,
    authenticated: bool,
    product: Option<String>,
    category: Option<String>,
    room: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = request(query, authenticated, product, category, room);
    println!("{}", resolve(&request));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_query_needs_login() {
        let nav = resolve(&request("what's in my cart", false, None, None, None));
        assert!(nav.path.starts_with("/login"));
    }

    #[test]
    fn product_name_becomes_slug() {
        let nav = resolve(&request("open it", false, Some("King Sized Bed".into()), None, None));
        assert!(nav.path.starts_with("/product/"));
        assert!(nav.path.contains("bed"));
    }
}
