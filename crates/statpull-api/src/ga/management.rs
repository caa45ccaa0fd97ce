// Management API v3: account tree and goals.

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::ga::client::AnalyticsClient;
use crate::ga::types::{AccountSummary, Collection};

impl AnalyticsClient {
    /// Every account the credentials can see, with properties and views.
    ///
    /// `GET management/accountSummaries`
    pub async fn account_summaries(&self) -> Result<Vec<AccountSummary>, Error> {
        let url = self.v3_url("management/accountSummaries")?;
        let collection: Collection<AccountSummary> = self.get_json(url, &[]).await?;
        Ok(collection.items)
    }

    /// The account owning `profile`, narrowed to the property and view
    /// containing it. `None` if no visible account holds the view.
    pub async fn parent_by_profile(&self, profile: &str) -> Result<Option<AccountSummary>, Error> {
        let tree = self.account_summaries().await?;
        debug!(profile, accounts = tree.len(), "searching account tree");
        Ok(find_parent(tree, profile))
    }

    /// Goals configured on a view. Loosely typed: the goal schema varies by
    /// goal type (URL destination, visit time, event, ...).
    ///
    /// `GET management/accounts/{account}/webproperties/{property}/profiles/{profile}/goals`
    pub async fn goals(
        &self,
        account: &str,
        property: &str,
        profile: &str,
    ) -> Result<Vec<Value>, Error> {
        let path = format!(
            "management/accounts/{account}/webproperties/{property}/profiles/{profile}/goals"
        );
        let url = self.v3_url(&path)?;
        let collection: Collection<Value> = self.get_json(url, &[]).await?;
        Ok(collection.items)
    }
}

fn find_parent(tree: Vec<AccountSummary>, profile: &str) -> Option<AccountSummary> {
    tree.into_iter().find_map(|mut account| {
        let mut property = account
            .web_properties
            .drain(..)
            .find(|p| p.profiles.iter().any(|v| v.id == profile))?;
        property.profiles.retain(|v| v.id == profile);
        account.web_properties = vec![property];
        Some(account)
    })
}
