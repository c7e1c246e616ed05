use sea_orm::ActiveValue;
use sea_orm::prelude::*;
use sea_orm::sea_query::OnConflict;

use weatherbot_entities::subscription;

#[derive(Clone, Debug)]
pub struct Service {
    db: DatabaseConnection,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),
}

/// Outcome of a registration command. Both variants carry the persisted
/// row, so callers can word the confirmation accordingly.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Created(subscription::Model),
    Updated(subscription::Model),
}

impl Service {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self))]
    pub async fn register_city(&self, line_user_id: &str, city: &str) -> Result<Registration, Error> {
        if let Some(existing) = subscription::Entity::find()
            .filter(subscription::Column::LineUserId.eq(line_user_id))
            .one(&self.db)
            .await?
        {
            let mut subscription: subscription::ActiveModel = existing.into();
            subscription.city = ActiveValue::Set(city.to_owned());
            let updated = subscription.update(&self.db).await?;

            return Ok(Registration::Updated(updated));
        }

        // The unique index on line_user_id is the only guard against two
        // concurrent first registrations; the conflict clause turns the
        // losing insert into the same city overwrite.
        let inserted = subscription::Entity::insert(subscription::ActiveModel {
            line_user_id: ActiveValue::Set(line_user_id.to_owned()),
            city: ActiveValue::Set(city.to_owned()),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::column(subscription::Column::LineUserId)
                .update_column(subscription::Column::City)
                .to_owned(),
        )
        .exec_with_returning(&self.db)
        .await?;

        tracing::debug!("Subscription created: {:?}", inserted);

        Ok(Registration::Created(inserted))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<subscription::Model>, Error> {
        let subscriptions = subscription::Entity::find().all(&self.db).await?;

        Ok(subscriptions)
    }
}
