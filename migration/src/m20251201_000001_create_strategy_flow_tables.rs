use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Strategies::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Strategies::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(Strategies::Name).string().not_null())
                    .col(ColumnDef::new(Strategies::Description).text().null())
                    .col(ColumnDef::new(Strategies::Enabled).boolean().not_null().default(true))
                    .col(ColumnDef::new(Strategies::Schedule).string().null()) // cron expression
                    .col(ColumnDef::new(Strategies::TriggerMetadata).json().null())
                    .col(ColumnDef::new(Strategies::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(Strategies::UpdatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StrategyNodes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StrategyNodes::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(StrategyNodes::StrategyId).big_unsigned().not_null())
                    .col(ColumnDef::new(StrategyNodes::NodeType).string().not_null())
                    .col(ColumnDef::new(StrategyNodes::Label).string().null())
                    .col(ColumnDef::new(StrategyNodes::Config).json().not_null())
                    .col(ColumnDef::new(StrategyNodes::OutputVariable).string().null())
                    .col(ColumnDef::new(StrategyNodes::Enabled).boolean().not_null().default(true))
                    .col(ColumnDef::new(StrategyNodes::Required).boolean().not_null().default(false))
                    .col(ColumnDef::new(StrategyNodes::OrderIndex).integer().not_null().default(0))
                    .col(ColumnDef::new(StrategyNodes::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_nodes_strategy_order")
                            .table(StrategyNodes::Table)
                            .col(StrategyNodes::StrategyId)
                            .col(StrategyNodes::OrderIndex)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_nodes_strategy")
                            .from(StrategyNodes::Table, StrategyNodes::StrategyId)
                            .to(Strategies::Table, Strategies::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StrategyEdges::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StrategyEdges::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(StrategyEdges::StrategyId).big_unsigned().not_null())
                    .col(ColumnDef::new(StrategyEdges::SourceNodeId).big_unsigned().not_null())
                    .col(ColumnDef::new(StrategyEdges::SourceHandle).string_len(16).null()) // default | true | false
                    .col(ColumnDef::new(StrategyEdges::TargetNodeId).big_unsigned().not_null())
                    .index(
                        Index::create()
                            .name("idx_edges_strategy")
                            .table(StrategyEdges::Table)
                            .col(StrategyEdges::StrategyId)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_edges_strategy")
                            .from(StrategyEdges::Table, StrategyEdges::StrategyId)
                            .to(Strategies::Table, Strategies::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_edges_source")
                            .from(StrategyEdges::Table, StrategyEdges::SourceNodeId)
                            .to(StrategyNodes::Table, StrategyNodes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_edges_target")
                            .from(StrategyEdges::Table, StrategyEdges::TargetNodeId)
                            .to(StrategyNodes::Table, StrategyNodes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StrategyExecutions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StrategyExecutions::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(StrategyExecutions::StrategyId).big_unsigned().not_null())
                    .col(ColumnDef::new(StrategyExecutions::ParentExecutionId).big_unsigned().null())
                    .col(ColumnDef::new(StrategyExecutions::TriggerType).string_len(16).not_null()) // cron | manual
                    .col(ColumnDef::new(StrategyExecutions::Status).string_len(16).not_null().default("running"))
                    .col(ColumnDef::new(StrategyExecutions::Error).text().null())
                    .col(ColumnDef::new(StrategyExecutions::StartedAt).timestamp().not_null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(StrategyExecutions::CompletedAt).timestamp().null())
                    .index(
                        Index::create()
                            .name("idx_executions_strategy")
                            .table(StrategyExecutions::Table)
                            .col(StrategyExecutions::StrategyId)
                            .col(StrategyExecutions::StartedAt)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_executions_strategy")
                            .from(StrategyExecutions::Table, StrategyExecutions::StrategyId)
                            .to(Strategies::Table, Strategies::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StrategyStepLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StrategyStepLogs::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(StrategyStepLogs::ExecutionId).big_unsigned().not_null())
                    .col(ColumnDef::new(StrategyStepLogs::NodeId).big_unsigned().not_null())
                    .col(ColumnDef::new(StrategyStepLogs::NodeType).string().not_null())
                    .col(ColumnDef::new(StrategyStepLogs::Input).json().not_null())
                    .col(ColumnDef::new(StrategyStepLogs::Output).json().null())
                    .col(ColumnDef::new(StrategyStepLogs::Error).text().null())
                    .col(ColumnDef::new(StrategyStepLogs::DurationMs).big_unsigned().not_null().default(0))
                    .col(ColumnDef::new(StrategyStepLogs::CreatedAt).timestamp().not_null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_step_logs_execution")
                            .table(StrategyStepLogs::Table)
                            .col(StrategyStepLogs::ExecutionId)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_step_logs_execution")
                            .from(StrategyStepLogs::Table, StrategyStepLogs::ExecutionId)
                            .to(StrategyExecutions::Table, StrategyExecutions::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        manager
            .drop_table(Table::drop().table(StrategyStepLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StrategyExecutions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StrategyEdges::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StrategyNodes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Strategies::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Strategies {
    Table,
    Id,
    Name,
    Description,
    Enabled,
    Schedule,
    TriggerMetadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StrategyNodes {
    Table,
    Id,
    StrategyId,
    NodeType,
    Label,
    Config,
    OutputVariable,
    Enabled,
    Required,
    OrderIndex,
    CreatedAt,
}

#[derive(DeriveIden)]
enum StrategyEdges {
    Table,
    Id,
    StrategyId,
    SourceNodeId,
    SourceHandle,
    TargetNodeId,
}

#[derive(DeriveIden)]
enum StrategyExecutions {
    Table,
    Id,
    StrategyId,
    ParentExecutionId,
    TriggerType,
    Status,
    Error,
    StartedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum StrategyStepLogs {
    Table,
    Id,
    ExecutionId,
    NodeId,
    NodeType,
    Input,
    Output,
    Error,
    DurationMs,
    CreatedAt,
}
