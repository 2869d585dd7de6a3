//! MongoDB database connection and configuration

use mongodb::bson::doc;
use mongodb::{options::ClientOptions, options::IndexOptions, Client, Database, IndexModel};

/// MongoDB database wrapper
#[derive(Clone)]
pub struct MongoDb {
    #[allow(dead_code)]
    client: Client,
    db: Database,
}

impl MongoDb {
    /// Connect to MongoDB
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;
        let db = client.database(db_name);

        // Test connection
        db.run_command(doc! { "ping": 1 }, None).await?;
        tracing::info!("Connected to MongoDB: {}", db_name);

        let instance = Self { client, db };
        instance.ensure_indexes().await?;

        Ok(instance)
    }

    /// Wrap an existing client without pinging or creating indexes
    pub fn with_client(client: Client, db_name: &str) -> Self {
        let db = client.database(db_name);
        Self { client, db }
    }

    /// Get database reference
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Get collection
    pub fn collection<T>(&self, name: &str) -> mongodb::Collection<T> {
        self.db.collection(name)
    }

    /// Ping the database to check connection
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    /// Ensure all required indexes exist
    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        tracing::info!("Ensuring MongoDB indexes...");

        self.create_indexes(
            collections::CLASSES,
            vec![IndexModel::builder().keys(doc! { "createdAt": 1 }).build()],
        )
        .await?;

        self.create_indexes(
            collections::SUBJECTS,
            vec![IndexModel::builder()
                .keys(doc! { "classId": 1, "createdAt": 1 })
                .build()],
        )
        .await?;

        self.create_indexes(
            collections::UNITS,
            vec![
                IndexModel::builder()
                    .keys(doc! { "subjectId": 1, "createdAt": 1 })
                    .build(),
                IndexModel::builder().keys(doc! { "classId": 1 }).build(),
            ],
        )
        .await?;

        self.create_indexes(
            collections::SUB_UNITS,
            vec![
                IndexModel::builder()
                    .keys(doc! { "unitId": 1, "createdAt": 1 })
                    .build(),
                IndexModel::builder().keys(doc! { "subjectId": 1 }).build(),
                IndexModel::builder().keys(doc! { "classId": 1 }).build(),
            ],
        )
        .await?;

        // Lessons carry the full ancestor path so upload resolution is a single lookup
        self.create_indexes(
            collections::LESSONS,
            vec![
                IndexModel::builder()
                    .keys(doc! { "subUnitId": 1, "createdAt": 1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "unitId": 1, "createdAt": 1 })
                    .build(),
                IndexModel::builder().keys(doc! { "subjectId": 1 }).build(),
                IndexModel::builder().keys(doc! { "classId": 1 }).build(),
            ],
        )
        .await?;

        self.create_indexes(
            collections::CONTENTS,
            vec![
                IndexModel::builder()
                    .keys(doc! { "lessonId": 1, "type": 1, "createdAt": 1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "metadata.upload.storedFileName": 1 })
                    .build(),
            ],
        )
        .await?;

        self.create_indexes(
            collections::USERS,
            vec![
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                IndexModel::builder().keys(doc! { "role": 1 }).build(),
            ],
        )
        .await?;

        self.create_indexes(
            collections::WEBMASTERS,
            vec![IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build()],
        )
        .await?;

        // Sessions collection indexes (with TTL for auto-cleanup)
        self.create_indexes(
            collections::SESSIONS,
            vec![
                IndexModel::builder()
                    .keys(doc! { "tokenHash": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                IndexModel::builder().keys(doc! { "principalId": 1 }).build(),
                IndexModel::builder()
                    .keys(doc! { "expiresAt": 1 })
                    .options(
                        IndexOptions::builder()
                            .expire_after(std::time::Duration::from_secs(0))
                            .build(),
                    )
                    .build(),
            ],
        )
        .await?;

        tracing::info!("MongoDB indexes ensured successfully");
        Ok(())
    }

    /// Helper to create indexes for a collection
    async fn create_indexes(
        &self,
        collection: &str,
        indexes: Vec<IndexModel>,
    ) -> anyhow::Result<()> {
        let coll = self.db.collection::<mongodb::bson::Document>(collection);
        coll.create_indexes(indexes, None).await?;
        Ok(())
    }
}

/// Collection names
pub mod collections {
    pub const CLASSES: &str = "classes";
    pub const SUBJECTS: &str = "subjects";
    pub const UNITS: &str = "units";
    pub const SUB_UNITS: &str = "subunits";
    pub const LESSONS: &str = "lessons";
    pub const CONTENTS: &str = "contents";
    pub const USERS: &str = "users";
    pub const WEBMASTERS: &str = "webmasters";
    pub const SESSIONS: &str = "sessions";

    /// Collections exposed to the admin import/export endpoints
    pub const MANAGED: &[&str] = &[
        CLASSES, SUBJECTS, UNITS, SUB_UNITS, LESSONS, CONTENTS, USERS, WEBMASTERS,
    ];
}
