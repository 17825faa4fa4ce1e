use std::sync::Arc;

use chrono::{DateTime, Utc};
use tonic::{Request, Response, Status};

use crate::models::{ItemListing, ItemStatus, ItemUpdate, ModerationAction};
use crate::proto::common::{ConfirmationPrompt as ProtoPrompt, Empty, OutcomeRes};
use crate::proto::moderation::moderation_service_server::ModerationService;
use crate::proto::moderation::{
    ApplyTransitionReq, DeleteItemReq, Direction, EditForm, Item, ItemFields, ItemIdReq,
    ItemRow as ProtoItemRow, ItemStatus as ProtoItemStatus, ListItemsReq, ListItemsRes,
    ModerationAction as ProtoModerationAction, NavigatePreviewReq, PrepareTransitionRes, Preview,
    SelectEditCategoryReq, SelectEditSubcategoryReq, SubcategoryChoice, SubmitEditFormReq,
    TransitionReq, UpdateItemReq,
};
use crate::services::edit_form::{ItemEditForm, ItemField};
use crate::services::item_service::ItemRow;
use crate::services::{ItemPreview, ItemService};
use crate::session::{CancelToken, SessionRegistry};

use super::{decision, outcome_to_proto, prompt_to_proto, session_for};

pub struct ModerationServiceImpl {
    items: Arc<ItemService>,
    sessions: Arc<SessionRegistry>,
}

impl ModerationServiceImpl {
    pub fn new(items: Arc<ItemService>, sessions: Arc<SessionRegistry>) -> Self {
        Self { items, sessions }
    }

    fn status_to_proto(status: ItemStatus) -> ProtoItemStatus {
        match status {
            ItemStatus::Pending => ProtoItemStatus::Pending,
            ItemStatus::Confirmed => ProtoItemStatus::Confirmed,
            ItemStatus::Blocked => ProtoItemStatus::Blocked,
        }
    }

    fn status_from_proto(status: ProtoItemStatus) -> ItemStatus {
        match status {
            ProtoItemStatus::Pending => ItemStatus::Pending,
            ProtoItemStatus::Confirmed => ItemStatus::Confirmed,
            ProtoItemStatus::Blocked => ItemStatus::Blocked,
        }
    }

    fn action_from_proto(raw: i32) -> Result<ModerationAction, Status> {
        match ProtoModerationAction::try_from(raw) {
            Ok(ProtoModerationAction::Confirm) => Ok(ModerationAction::Confirm),
            Ok(ProtoModerationAction::Block) => Ok(ModerationAction::Block),
            _ => Err(Status::invalid_argument("action must be CONFIRM or BLOCK")),
        }
    }

    fn item_to_proto(item: ItemListing) -> Item {
        let status = Self::status_to_proto(item.item_status);
        let status_label = item.item_status.label().to_string();
        let price_label = item.price_label();
        let date_label = item.date_label();
        Item {
            id: item.id,
            fields: Some(ItemFields {
                name: item.item_name,
                price: item.item_price,
                brand: item.item_brand,
                category_id: item.item_category,
                subcategory_id: item.item_sub_category,
                country: item.item_country,
                city: item.item_city,
                town: item.item_town,
                district: item.item_district,
                street: item.item_street,
                date: item.item_date.to_rfc3339(),
                description: item.item_desc,
            }),
            status: status.into(),
            status_label,
            price_label,
            date_label,
        }
    }

    fn date_from_proto(date: &str) -> Result<DateTime<Utc>, Status> {
        Ok(DateTime::parse_from_rfc3339(date)
            .map_err(|e| Status::invalid_argument(format!("invalid date '{}': {}", date, e)))?
            .with_timezone(&Utc))
    }

    fn update_from_proto(fields: ItemFields) -> Result<ItemUpdate, Status> {
        let item_date = Self::date_from_proto(&fields.date)?;
        Ok(ItemUpdate {
            item_name: fields.name,
            item_price: fields.price,
            item_brand: fields.brand,
            item_category: fields.category_id,
            item_sub_category: fields.subcategory_id,
            item_country: fields.country,
            item_city: fields.city,
            item_town: fields.town,
            item_district: fields.district,
            item_street: fields.street,
            item_date,
            item_desc: fields.description,
        })
    }

    fn form_to_proto(form: ItemEditForm) -> EditForm {
        let draft = form.draft();
        EditForm {
            item_id: form.item_id().to_string(),
            fields: Some(ItemFields {
                name: draft.item_name.clone(),
                price: draft.item_price,
                brand: draft.item_brand.clone(),
                category_id: draft.item_category.clone(),
                subcategory_id: draft.item_sub_category.clone(),
                country: draft.item_country.clone(),
                city: draft.item_city.clone(),
                town: draft.item_town.clone(),
                district: draft.item_district.clone(),
                street: draft.item_street.clone(),
                date: draft.item_date.to_rfc3339(),
                description: draft.item_desc.clone(),
            }),
            subcategory_choices: form
                .subcategory_choices()
                .iter()
                .map(|s| SubcategoryChoice {
                    id: s.id.clone(),
                    name: s.sub_category_name.clone(),
                })
                .collect(),
            subcategory_enabled: form.is_subcategory_enabled(),
        }
    }

    /// Copies the free-text fields, price and date into the open form.
    fn apply_form_fields(form: &mut ItemEditForm, fields: ItemFields, date: DateTime<Utc>) {
        form.set_field(ItemField::Name, fields.name);
        form.set_field(ItemField::Brand, fields.brand);
        form.set_field(ItemField::Country, fields.country);
        form.set_field(ItemField::City, fields.city);
        form.set_field(ItemField::Town, fields.town);
        form.set_field(ItemField::District, fields.district);
        form.set_field(ItemField::Street, fields.street);
        form.set_field(ItemField::Description, fields.description);
        form.set_price(fields.price);
        form.set_date(date);
    }

    fn row_to_proto(row: ItemRow) -> ProtoItemRow {
        ProtoItemRow {
            id: row.id,
            name: row.name,
            category: row.category,
            subcategory: row.subcategory,
            status: Self::status_to_proto(row.status).into(),
            status_label: row.status_label,
            price_label: row.price_label,
            date_label: row.date_label,
        }
    }

    fn preview_to_proto(preview: ItemPreview) -> Preview {
        Preview {
            index: preview.gallery.index() as u32,
            can_navigate: preview.gallery.can_navigate(),
            image_urls: preview.gallery.urls().to_vec(),
            item: Some(Self::item_to_proto(preview.item)),
        }
    }
}

#[tonic::async_trait]
impl ModerationService for ModerationServiceImpl {
    async fn list_items(
        &self,
        request: Request<ListItemsReq>,
    ) -> Result<Response<ListItemsRes>, Status> {
        session_for(&self.sessions, &request)?;
        let req = request.into_inner();

        let filter = match req.status {
            Some(raw) => Some(Self::status_from_proto(
                ProtoItemStatus::try_from(raw)
                    .map_err(|_| Status::invalid_argument("unknown item status"))?,
            )),
            None => None,
        };

        let rows = self.items.item_rows().await?;
        Ok(Response::new(ListItemsRes {
            rows: rows
                .into_iter()
                .filter(|row| filter.map_or(true, |status| row.status == status))
                .map(Self::row_to_proto)
                .collect(),
        }))
    }

    async fn get_item(&self, request: Request<ItemIdReq>) -> Result<Response<Item>, Status> {
        session_for(&self.sessions, &request)?;
        let item = self.items.get_item(&request.into_inner().id).await?;
        Ok(Response::new(Self::item_to_proto(item)))
    }

    async fn prepare_transition(
        &self,
        request: Request<TransitionReq>,
    ) -> Result<Response<PrepareTransitionRes>, Status> {
        session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        let action = Self::action_from_proto(req.action)?;

        let prepared = self.items.prepare_transition(&req.id, action).await?;
        Ok(Response::new(PrepareTransitionRes {
            item_id: prepared.item_id,
            from: Self::status_to_proto(prepared.from).into(),
            to: Self::status_to_proto(prepared.to).into(),
            prompt: Some(prompt_to_proto(prepared.prompt)),
        }))
    }

    async fn apply_transition(
        &self,
        request: Request<ApplyTransitionReq>,
    ) -> Result<Response<OutcomeRes>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        let action = Self::action_from_proto(req.action)?;

        let prepared = self.items.prepare_transition(&req.id, action).await?;
        let outcome = self
            .items
            .apply_transition(&session, &prepared, decision(req.accepted))
            .await?;
        Ok(Response::new(outcome_to_proto(outcome)))
    }

    async fn update_item(
        &self,
        request: Request<UpdateItemReq>,
    ) -> Result<Response<Empty>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        let fields = req
            .fields
            .ok_or_else(|| Status::invalid_argument("fields are required"))?;
        let update = Self::update_from_proto(fields)?;

        self.items.update_item(&session, &req.id, &update).await?;
        Ok(Response::new(Empty {}))
    }

    async fn prepare_delete(
        &self,
        request: Request<ItemIdReq>,
    ) -> Result<Response<ProtoPrompt>, Status> {
        session_for(&self.sessions, &request)?;
        let prepared = self.items.prepare_delete(&request.into_inner().id).await?;
        Ok(Response::new(prompt_to_proto(prepared.prompt)))
    }

    async fn delete_item(
        &self,
        request: Request<DeleteItemReq>,
    ) -> Result<Response<OutcomeRes>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();

        let prepared = self.items.prepare_delete(&req.id).await?;
        let outcome = self
            .items
            .delete_item(&session, &prepared, decision(req.accepted))
            .await?;
        Ok(Response::new(outcome_to_proto(outcome)))
    }

    async fn open_edit_form(
        &self,
        request: Request<ItemIdReq>,
    ) -> Result<Response<EditForm>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let form = self
            .items
            .open_edit_form(&session, &request.into_inner().id)
            .await?;
        Ok(Response::new(Self::form_to_proto(form)))
    }

    async fn select_edit_category(
        &self,
        request: Request<SelectEditCategoryReq>,
    ) -> Result<Response<EditForm>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let form = self
            .items
            .select_edit_category(
                &session,
                &request.into_inner().category_id,
                &CancelToken::new(),
            )
            .await?;
        Ok(Response::new(Self::form_to_proto(form)))
    }

    async fn select_edit_subcategory(
        &self,
        request: Request<SelectEditSubcategoryReq>,
    ) -> Result<Response<EditForm>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let form = self
            .items
            .select_edit_subcategory(&session, &request.into_inner().subcategory_id)?;
        Ok(Response::new(Self::form_to_proto(form)))
    }

    async fn submit_edit_form(
        &self,
        request: Request<SubmitEditFormReq>,
    ) -> Result<Response<Empty>, Status> {
        let session = session_for(&self.sessions, &request)?;
        if let Some(fields) = request.into_inner().fields {
            let date = Self::date_from_proto(&fields.date)?;
            session
                .with_edit_form(|form| Self::apply_form_fields(form, fields, date))
                .ok_or_else(|| Status::failed_precondition("No item edit form is open"))?;
        }
        self.items.submit_edit_form(&session).await?;
        Ok(Response::new(Empty {}))
    }

    async fn close_edit_form(&self, request: Request<Empty>) -> Result<Response<Empty>, Status> {
        let session = session_for(&self.sessions, &request)?;
        session.close_edit_form();
        Ok(Response::new(Empty {}))
    }

    async fn open_preview(&self, request: Request<ItemIdReq>) -> Result<Response<Preview>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let preview = self
            .items
            .open_preview(&session, &request.into_inner().id, &CancelToken::new())
            .await?;
        Ok(Response::new(Self::preview_to_proto(preview)))
    }

    async fn navigate_preview(
        &self,
        request: Request<NavigatePreviewReq>,
    ) -> Result<Response<Preview>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let direction = request.into_inner().direction();

        let preview = session
            .with_preview(|preview| {
                match direction {
                    Direction::Next => preview.gallery.next(),
                    Direction::Prev => preview.gallery.prev(),
                    Direction::Unspecified => None,
                };
                preview.clone()
            })
            .ok_or_else(|| Status::failed_precondition("No preview is open"))?;
        Ok(Response::new(Self::preview_to_proto(preview)))
    }

    async fn close_preview(&self, request: Request<Empty>) -> Result<Response<Empty>, Status> {
        let session = session_for(&self.sessions, &request)?;
        session.close_preview();
        Ok(Response::new(Empty {}))
    }
}
