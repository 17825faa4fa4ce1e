use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::models::{Category, Subcategory};
use crate::proto::common::Empty;
use crate::proto::taxonomy::taxonomy_service_server::TaxonomyService;
use crate::proto::taxonomy::{
    Category as ProtoCategory, CreateCategoryReq, CreateSubcategoryReq, DeleteCategoryReq,
    DeleteCategoryRes, DeleteSubcategoryReq, GetCategoryReq, GetSubcategoryReq,
    ListCategoriesRes, ListSubcategoriesReq, ListSubcategoriesRes, Subcategory as ProtoSubcategory,
    UpdateCategoryReq, UpdateSubcategoryReq,
};
use crate::services::CategoryService;
use crate::session::{CancelToken, SessionRegistry};

use super::session_for;

pub struct TaxonomyServiceImpl {
    categories: Arc<CategoryService>,
    sessions: Arc<SessionRegistry>,
}

impl TaxonomyServiceImpl {
    pub fn new(categories: Arc<CategoryService>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            categories,
            sessions,
        }
    }

    fn category_to_proto(category: Category) -> ProtoCategory {
        ProtoCategory {
            id: category.id,
            name: category.category_name,
        }
    }

    fn subcategory_to_proto(subcategory: Subcategory) -> ProtoSubcategory {
        ProtoSubcategory {
            id: subcategory.id,
            name: subcategory.sub_category_name,
        }
    }

    fn subcategories_res(category_id: String, subcategories: Vec<Subcategory>) -> ListSubcategoriesRes {
        ListSubcategoriesRes {
            category_id,
            subcategories: subcategories
                .into_iter()
                .map(Self::subcategory_to_proto)
                .collect(),
        }
    }
}

#[tonic::async_trait]
impl TaxonomyService for TaxonomyServiceImpl {
    async fn list_categories(
        &self,
        request: Request<Empty>,
    ) -> Result<Response<ListCategoriesRes>, Status> {
        session_for(&self.sessions, &request)?;
        let categories = self.categories.list_categories().await?;
        Ok(Response::new(ListCategoriesRes {
            categories: categories
                .into_iter()
                .map(Self::category_to_proto)
                .collect(),
        }))
    }

    async fn get_category(
        &self,
        request: Request<GetCategoryReq>,
    ) -> Result<Response<ProtoCategory>, Status> {
        session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        let category = self.categories.begin_edit_category(&req.id).await?;
        Ok(Response::new(Self::category_to_proto(category)))
    }

    async fn create_category(
        &self,
        request: Request<CreateCategoryReq>,
    ) -> Result<Response<ProtoCategory>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        let category = self.categories.create_category(&session, &req.name).await?;
        Ok(Response::new(Self::category_to_proto(category)))
    }

    async fn update_category(
        &self,
        request: Request<UpdateCategoryReq>,
    ) -> Result<Response<Empty>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        if req.id.is_empty() {
            return Err(Status::invalid_argument("id is required"));
        }
        self.categories
            .update_category(&session, &req.id, &req.name)
            .await?;
        Ok(Response::new(Empty {}))
    }

    async fn delete_category(
        &self,
        request: Request<DeleteCategoryReq>,
    ) -> Result<Response<DeleteCategoryRes>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        if req.id.is_empty() {
            return Err(Status::invalid_argument("id is required"));
        }
        let deletion = self.categories.delete_category(&session, &req.id).await?;
        Ok(Response::new(DeleteCategoryRes {
            subcategories_removed: deletion.subcategories_removed as u32,
        }))
    }

    async fn list_subcategories(
        &self,
        request: Request<ListSubcategoriesReq>,
    ) -> Result<Response<ListSubcategoriesRes>, Status> {
        session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        let subcategories = self.categories.list_subcategories(&req.category_id).await?;
        Ok(Response::new(Self::subcategories_res(
            req.category_id,
            subcategories,
        )))
    }

    async fn expand_category(
        &self,
        request: Request<ListSubcategoriesReq>,
    ) -> Result<Response<ListSubcategoriesRes>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        // a dropped call drops this future, so the token only guards the focus race
        let listing = self
            .categories
            .expand_category(&session, &req.category_id, &CancelToken::new())
            .await?;
        Ok(Response::new(Self::subcategories_res(
            listing.category_id,
            listing.subcategories,
        )))
    }

    async fn get_subcategory(
        &self,
        request: Request<GetSubcategoryReq>,
    ) -> Result<Response<ProtoSubcategory>, Status> {
        session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        let subcategory = self
            .categories
            .begin_edit_subcategory(&req.category_id, &req.id)
            .await?;
        Ok(Response::new(Self::subcategory_to_proto(subcategory)))
    }

    async fn create_subcategory(
        &self,
        request: Request<CreateSubcategoryReq>,
    ) -> Result<Response<ProtoSubcategory>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        let subcategory = self
            .categories
            .create_subcategory(&session, &req.category_id, &req.name)
            .await?;
        Ok(Response::new(Self::subcategory_to_proto(subcategory)))
    }

    async fn update_subcategory(
        &self,
        request: Request<UpdateSubcategoryReq>,
    ) -> Result<Response<Empty>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        self.categories
            .update_subcategory(&session, &req.category_id, &req.id, &req.name)
            .await?;
        Ok(Response::new(Empty {}))
    }

    async fn delete_subcategory(
        &self,
        request: Request<DeleteSubcategoryReq>,
    ) -> Result<Response<Empty>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        self.categories
            .delete_subcategory(&session, &req.category_id, &req.id)
            .await?;
        Ok(Response::new(Empty {}))
    }
}
