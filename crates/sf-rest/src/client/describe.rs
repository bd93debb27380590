use std::sync::Arc;
use tracing::{debug, instrument};

use sf_toolkit_client::security::soql;
use sf_toolkit_client::Connection;
use sf_toolkit_records::SObjectSchema;

use crate::error::{Error, Result};

impl<C: Connection> super::SalesforceRestClient<C> {
    /// Describe an sObject and register the resulting schema.
    ///
    /// Subsequent queries and list operations on the same sObject resolve
    /// the schema from the registry without another request.
    #[instrument(skip(self))]
    pub async fn describe(&self, sobject: &str) -> Result<Arc<SObjectSchema>> {
        if !soql::is_safe_sobject_name(sobject) {
            return Err(Error::validation(format!("invalid SObject name '{sobject}'")));
        }
        let url = self
            .connection
            .rest_url(&format!("sobjects/{sobject}/describe"));
        let describe: serde_json::Value = self.connection.get_json(&url).await?;
        let schema = SObjectSchema::from_describe(&describe)?;
        debug!(sobject, fields = schema.fields().len(), "Described sObject");
        Ok(self.schemas().register(schema))
    }

    /// The registered schema for `sobject`, describing it on first use.
    pub async fn schema(&self, sobject: &str) -> Result<Arc<SObjectSchema>> {
        match self.schemas().find(sobject) {
            Some(schema) => Ok(schema),
            None => self.describe(sobject).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::MockConnection;
    use crate::SalesforceRestClient;
    use serde_json::json;
    use sf_toolkit_client::Response;
    use sf_toolkit_records::{FieldType, SchemaRegistry};
    use std::sync::Arc;

    fn describe_response() -> serde_json::Value {
        json!({
            "name": "Account",
            "fields": [
                {"name": "Id", "type": "id", "createable": false, "updateable": false, "nillable": false},
                {"name": "Name", "type": "string", "createable": true, "updateable": true},
                {"name": "AnnualRevenue", "type": "currency", "createable": true, "updateable": true, "nillable": true},
                {"name": "OwnerId", "type": "reference", "referenceTo": ["User"], "relationshipName": "Owner",
                 "createable": true, "updateable": true}
            ]
        })
    }

    #[tokio::test]
    async fn test_describe_registers_schema_once() {
        let connection = MockConnection::new(|request| {
            assert!(request.url().ends_with("/sobjects/Account/describe"));
            Ok(Response::json_body(200, &describe_response()))
        });
        let registry = Arc::new(SchemaRegistry::new());
        let client = SalesforceRestClient::from_connection(connection).with_schemas(registry.clone());

        let schema = client.schema("Account").await.unwrap();
        assert_eq!(schema.field("AnnualRevenue").unwrap().field_type, FieldType::Number);
        assert!(schema.field("Id").unwrap().flags.readonly);
        assert!(registry.find("Account").is_some());

        client.schema("Account").await.unwrap();
        assert_eq!(client.connection().calls(), 1);
    }

    #[tokio::test]
    async fn test_describe_rejects_bad_names() {
        let client = SalesforceRestClient::from_connection(MockConnection::new(|_| {
            Ok(Response::json_body(200, &json!({})))
        }));
        assert!(client.describe("Account/../x").await.is_err());
        assert_eq!(client.connection().calls(), 0);
    }
}
